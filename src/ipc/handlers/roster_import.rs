use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::setup::{load_import_options, parse_email_domain};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{parse_roster, ImportOptions, ImportResult};
use crate::store::{submit_import, SqliteRosterStore};
use crate::{template, workbook};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn import_options(conn: Option<&Connection>, req: &Request) -> Result<ImportOptions, HandlerErr> {
    let mut options = match conn {
        Some(conn) => load_import_options(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?,
        None => ImportOptions::default(),
    };
    if let Some(v) = req.params.get("emailDomain").filter(|v| !v.is_null()) {
        options.email_domain =
            parse_email_domain(v, "emailDomain").map_err(|m| HandlerErr::new("bad_params", m))?;
    }
    Ok(options)
}

fn parse_file(conn: Option<&Connection>, req: &Request) -> Result<ImportResult, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(&req.params, "inPath")?);
    let sheet = get_optional_str(&req.params, "sheet");
    let options = import_options(conn, req)?;

    let rows = workbook::read_rows(&in_path, sheet.as_deref()).map_err(|e| {
        log::warn!("cannot read {}: {e:#}", in_path.display());
        HandlerErr::new("read_failed", format!("{e:#}"))
            .with_details(json!({ "path": in_path.to_string_lossy() }))
    })?;
    let result = parse_roster(&rows, &options).map_err(|e| {
        log::info!("roster parse failed for {}: {}", in_path.display(), e);
        HandlerErr::new("parse_failed", e.to_string()).with_details(json!({ "kind": e.kind() }))
    })?;

    log::info!(
        "parsed {}: header row {}, {} records ({} valid, {} warning, {} error)",
        in_path.display(),
        result.header_row,
        result.summary.total,
        result.summary.valid,
        result.summary.warning,
        result.summary.error
    );
    Ok(result)
}

fn to_json(result: &ImportResult) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(result).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

fn handle_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Preview works without a workspace; persisted options apply when one is open.
    match parse_file(state.db.as_ref(), req).and_then(|r| to_json(&r)) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn apply(conn: &Connection, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(&req.params, "classId")?;
    let mut result = parse_file(Some(conn), req)?;
    let mut store = SqliteRosterStore::new(conn);
    submit_import(&mut store, &class_id, &mut result).map_err(|e| {
        log::error!("roster submission to class {} failed: {}", class_id, e);
        HandlerErr::new(e.code(), e.to_string()).with_details(json!({ "classId": class_id }))
    })?;
    to_json(&result)
}

fn handle_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match apply(conn, req) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

fn handle_template(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match get_required_str(&req.params, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e.response(&req.id),
    };
    match template::write_template(&out_path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "outPath": out_path.to_string_lossy(),
                "sheet": template::TEMPLATE_SHEET_NAME,
                "headers": template::TEMPLATE_HEADERS
            }),
        ),
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rosterImport.preview" => Some(handle_preview(state, req)),
        "rosterImport.apply" => Some(handle_apply(state, req)),
        "rosterImport.template" => Some(handle_template(state, req)),
        _ => None,
    }
}
