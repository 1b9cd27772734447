use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn require_class(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    match exists {
        Some(_) => Ok(()),
        None => Err(HandlerErr::new("not_found", "class not found")),
    }
}

fn list_students(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(&req.params, "classId")?;
    require_class(conn, &class_id)?;

    let mut stmt = conn
        .prepare(
            "SELECT p.id, p.student_code, p.full_name, p.email, p.phone,
                    p.class_name, p.birth_date, p.gender, cs.sort_order
             FROM class_students cs
             JOIN profiles p ON p.id = cs.profile_id
             WHERE cs.class_id = ?
             ORDER BY cs.sort_order, p.student_code",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let students = stmt
        .query_map([&class_id], |row| {
            let id: String = row.get(0)?;
            let student_code: String = row.get(1)?;
            let full_name: String = row.get(2)?;
            let email: String = row.get(3)?;
            let phone: Option<String> = row.get(4)?;
            let class_name: Option<String> = row.get(5)?;
            let birth_date: Option<String> = row.get(6)?;
            let gender: Option<String> = row.get(7)?;
            let sort_order: i64 = row.get(8)?;
            Ok(json!({
                "id": id,
                "studentCode": student_code,
                "fullName": full_name,
                "email": email,
                "phone": phone,
                "className": class_name,
                "birthDate": birth_date,
                "gender": gender,
                "sortOrder": sort_order
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    Ok(json!({ "classId": class_id, "students": students }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match list_students(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn remove_student(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(&req.params, "classId")?;
    let student_id = get_required_str(&req.params, "studentId")?;
    require_class(conn, &class_id)?;

    // Only the membership goes; the profile may belong to other classes.
    let removed = conn
        .execute(
            "DELETE FROM class_students WHERE class_id = ? AND profile_id = ?",
            (&class_id, &student_id),
        )
        .map_err(|e| {
            HandlerErr::new("db_delete_failed", e.to_string())
                .with_details(json!({ "table": "class_students" }))
        })?;
    if removed == 0 {
        return Err(HandlerErr::new("not_found", "student not in class"));
    }
    log::info!("removed student {} from class {}", student_id, class_id);
    Ok(json!({ "ok": true }))
}

fn handle_students_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match remove_student(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.remove" => Some(handle_students_remove(state, req)),
        _ => None,
    }
}
