mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rosterd-router-smoke");
    let template_out = workspace.join("template.xlsx");

    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].is_string());
    assert!(health["workspacePath"].is_null());

    let empty = request_ok(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(empty["classes"], json!([]));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "5", "sessions.list", json!({}));
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.create",
        json!({ "name": "Smoke Class" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "classId": class_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "rosterImport.template",
        json!({ "outPath": template_out.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "rosterImport.preview",
        json!({ "inPath": template_out.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    let deleted_again = request(
        &mut stdin,
        &mut reader,
        "11",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    assert_eq!(error_code(&deleted_again), "not_found");

    let unknown = request(&mut stdin, &mut reader, "12", "marksets.list", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    let missing = request(&mut stdin, &mut reader, "13", "workspace.select", json!({}));
    assert_eq!(error_code(&missing), "bad_params");
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
}
