use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn row_to_class(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let code: Option<String> = row.get(2)?;
    let session_id: Option<String> = row.get(3)?;
    let student_count: i64 = row.get(4)?;
    Ok(json!({
        "id": id,
        "name": name,
        "code": code,
        "sessionId": session_id,
        "studentCount": student_count
    }))
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    // Correlated subquery so memberships are not double-counted.
    let base = "SELECT
           c.id,
           c.name,
           c.code,
           c.session_id,
           (SELECT COUNT(*) FROM class_students cs WHERE cs.class_id = c.id) AS student_count
         FROM classes c";
    let session_id = get_optional_str(&req.params, "sessionId");
    let sql = match session_id {
        Some(_) => format!("{base} WHERE c.session_id = ?1 ORDER BY c.name"),
        None => format!("{base} ORDER BY c.name"),
    };
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = match session_id.as_deref() {
        Some(sid) => stmt.query_map([sid], row_to_class),
        None => stmt.query_map([], row_to_class),
    }
    .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn create_class(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let code = get_optional_str(&req.params, "code");
    let session_id = get_optional_str(&req.params, "sessionId");

    if let Some(sid) = session_id.as_deref() {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM sessions WHERE id = ?", [sid], |r| r.get(0))
            .optional()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        if exists.is_none() {
            return Err(HandlerErr::new("not_found", "session not found"));
        }
    }

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, session_id, name, code) VALUES(?, ?, ?, ?)",
        (&class_id, &session_id, &name, &code),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "classes" }))
    })?;

    log::info!("created class {} ({})", class_id, name);
    Ok(json!({
        "classId": class_id,
        "name": name,
        "code": code,
        "sessionId": session_id
    }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match create_class(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Dependency order (no ON DELETE CASCADE). Profiles are shared and kept.
    if let Err(e) = tx.execute("DELETE FROM class_students WHERE class_id = ?", [&class_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "class_students" })),
        );
    }
    if let Err(e) = tx.execute("DELETE FROM classes WHERE id = ?", [&class_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    log::info!("deleted class {}", class_id);
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
