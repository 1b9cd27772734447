use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::setup::load_default_milestone_template;
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::sessions::{generate_milestones, parse_iso_date, MilestoneTemplate};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn session_exists(conn: &Connection, session_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM sessions WHERE id = ?", [session_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn handle_sessions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sessions": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT
           s.id,
           s.name,
           s.start_date,
           s.status,
           s.milestone_template,
           (SELECT COUNT(*) FROM classes c WHERE c.session_id = s.id) AS class_count
         FROM sessions s
         ORDER BY s.start_date DESC, s.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let start_date: String = row.get(2)?;
            let status: String = row.get(3)?;
            let template: String = row.get(4)?;
            let class_count: i64 = row.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "startDate": start_date,
                "status": status,
                "template": template,
                "classCount": class_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn create_session(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let start_raw = get_required_str(&req.params, "startDate")?;
    let Some(start) = parse_iso_date(&start_raw) else {
        return Err(HandlerErr::new("bad_params", "startDate must be YYYY-MM-DD"));
    };
    let template = match get_optional_str(&req.params, "template") {
        Some(raw) => MilestoneTemplate::parse(&raw).ok_or_else(|| {
            HandlerErr::new("bad_params", "template must be one of: standard, short")
        })?,
        None => load_default_milestone_template(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?,
    };

    let session_id = Uuid::new_v4().to_string();
    let milestones = generate_milestones(start, template);
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "INSERT INTO sessions(id, name, start_date, status, milestone_template, created_at)
         VALUES(?, ?, ?, 'planned', ?, ?)",
        (
            &session_id,
            &name,
            start.format("%Y-%m-%d").to_string(),
            template.key(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "sessions" }))
    })?;
    for m in &milestones {
        tx.execute(
            "INSERT INTO session_milestones(id, session_id, kind, title, due_date, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &session_id,
                m.kind,
                m.title,
                m.due_date.format("%Y-%m-%d").to_string(),
                m.sort_order,
            ),
        )
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "session_milestones" }))
        })?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    log::info!(
        "created session {} ({}) with {} milestones",
        session_id,
        template.key(),
        milestones.len()
    );
    Ok(json!({
        "sessionId": session_id,
        "name": name,
        "template": template.key(),
        "milestoneCount": milestones.len()
    }))
}

fn handle_sessions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match create_session(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn list_milestones(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(&req.params, "sessionId")?;
    if !session_exists(conn, &session_id)? {
        return Err(HandlerErr::new("not_found", "session not found"));
    }
    let mut stmt = conn
        .prepare(
            "SELECT kind, title, due_date, sort_order
             FROM session_milestones
             WHERE session_id = ?
             ORDER BY sort_order",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let milestones = stmt
        .query_map([&session_id], |row| {
            let kind: String = row.get(0)?;
            let title: String = row.get(1)?;
            let due_date: String = row.get(2)?;
            let sort_order: i64 = row.get(3)?;
            Ok(json!({
                "kind": kind,
                "title": title,
                "dueDate": due_date,
                "sortOrder": sort_order
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "sessionId": session_id, "milestones": milestones }))
}

fn handle_sessions_milestones(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match list_milestones(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn delete_session(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(&req.params, "sessionId")?;
    if !session_exists(conn, &session_id)? {
        return Err(HandlerErr::new("not_found", "session not found"));
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Classes outlive their session; they are only detached.
    for (sql, table) in [
        ("UPDATE classes SET session_id = NULL WHERE session_id = ?", "classes"),
        ("DELETE FROM session_milestones WHERE session_id = ?", "session_milestones"),
        ("DELETE FROM sessions WHERE id = ?", "sessions"),
    ] {
        tx.execute(sql, [&session_id]).map_err(|e| {
            HandlerErr::new("db_delete_failed", e.to_string()).with_details(json!({ "table": table }))
        })?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    log::info!("deleted session {}", session_id);
    Ok(json!({ "ok": true }))
}

fn handle_sessions_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match delete_session(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_sessions_list(state, req)),
        "sessions.create" => Some(handle_sessions_create(state, req)),
        "sessions.milestones" => Some(handle_sessions_milestones(state, req)),
        "sessions.delete" => Some(handle_sessions_delete(state, req)),
        _ => None,
    }
}
