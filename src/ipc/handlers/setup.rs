use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::{
    ImportOptions, DEFAULT_EMAIL_DOMAIN, DEFAULT_FALLBACK_SCAN_ROWS, DEFAULT_HEADER_SCAN_ROWS,
};
use crate::sessions::MilestoneTemplate;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
    Sessions,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            "sessions" => Some(Self::Sessions),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
            Self::Sessions => "setup.sessions",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => json!({
            "emailDomain": DEFAULT_EMAIL_DOMAIN,
            "headerScanRows": DEFAULT_HEADER_SCAN_ROWS,
            "fallbackScanRows": DEFAULT_FALLBACK_SCAN_ROWS
        }),
        SetupSection::Sessions => json!({
            "defaultMilestoneTemplate": MilestoneTemplate::Standard.key()
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn parse_email_domain(v: &Value, key: &str) -> Result<String, String> {
    let s = parse_string_max(v, key, 120)?;
    let domain = s.trim_start_matches('@').to_ascii_lowercase();
    if domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.chars().any(|c| c.is_whitespace() || c == '@')
    {
        return Err(format!("{} must be a domain like school.edu.vn", key));
    }
    Ok(domain)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "emailDomain" => {
                    obj.insert(k.clone(), Value::String(parse_email_domain(v, k)?));
                }
                "headerScanRows" | "fallbackScanRows" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 50)?));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
            SetupSection::Sessions => match k.as_str() {
                "defaultMilestoneTemplate" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(t) = MilestoneTemplate::parse(&s) else {
                        return Err(
                            "defaultMilestoneTemplate must be one of: standard, short".into(),
                        );
                    };
                    obj.insert(k.clone(), Value::String(t.key().to_string()));
                }
                _ => return Err(format!("unknown sessions field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults instead of blocking.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                log::warn!("ignoring saved {}: {}", section.key(), e);
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn load_import_options(conn: &rusqlite::Connection) -> anyhow::Result<ImportOptions> {
    let section = load_section(conn, SetupSection::Import)?;
    let defaults = ImportOptions::default();
    Ok(ImportOptions {
        email_domain: section
            .get("emailDomain")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(defaults.email_domain),
        header_scan_rows: section
            .get("headerScanRows")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(defaults.header_scan_rows),
        fallback_scan_rows: section
            .get("fallbackScanRows")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(defaults.fallback_scan_rows),
    })
}

pub fn load_default_milestone_template(
    conn: &rusqlite::Connection,
) -> anyhow::Result<MilestoneTemplate> {
    let section = load_section(conn, SetupSection::Sessions)?;
    Ok(section
        .get("defaultMilestoneTemplate")
        .and_then(|v| v.as_str())
        .and_then(MilestoneTemplate::parse)
        .unwrap_or(MilestoneTemplate::Standard))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let import = match load_section(conn, SetupSection::Import) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let sessions = match load_section(conn, SetupSection::Sessions) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "import": import,
            "sessions": sessions
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    log::info!("updated {}", section.key());
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_validation() {
        assert_eq!(
            parse_email_domain(&json!("@Students.DNC.edu.vn"), "emailDomain"),
            Ok("students.dnc.edu.vn".to_string())
        );
        assert!(parse_email_domain(&json!("localhost"), "emailDomain").is_err());
        assert!(parse_email_domain(&json!("a b.edu"), "emailDomain").is_err());
        assert!(parse_email_domain(&json!(12), "emailDomain").is_err());
    }

    #[test]
    fn saved_values_override_defaults() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(
            &conn,
            "setup.import",
            &json!({ "emailDomain": "example.edu", "headerScanRows": 4 }),
        )
        .expect("save");
        let options = load_import_options(&conn).expect("options");
        assert_eq!(options.email_domain, "example.edu");
        assert_eq!(options.header_scan_rows, 4);
        assert_eq!(options.fallback_scan_rows, DEFAULT_FALLBACK_SCAN_ROWS);
    }

    #[test]
    fn malformed_saved_section_falls_back() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(&conn, "setup.sessions", &json!({ "defaultMilestoneTemplate": "weekly" }))
            .expect("save");
        assert_eq!(
            load_default_milestone_template(&conn).expect("template"),
            MilestoneTemplate::Standard
        );
    }
}
