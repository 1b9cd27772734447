use std::collections::HashSet;

use super::cell::{cell_at, Cell};
use super::error::ParseError;
use super::header::{describe_map, locate_header, map_columns, Field, HeaderMap};
use super::normalize::squash_spaces;
use super::types::{status_for, ImportOptions, ImportResult, ImportSummary, ParsedRecord};
use super::values;

pub const MSG_MISSING_NAME: &str = "missing name";
pub const MSG_INVALID_EMAIL: &str = "invalid email";
pub const MSG_DUPLICATE_CODE: &str = "duplicate code in file";

/// Parses one worksheet into an [`ImportResult`].
///
/// Only structural problems fail the call; row-level problems are recorded
/// on the row itself. Rows without a code and summary/footer rows are
/// dropped rather than reported.
pub fn parse_roster(rows: &[Vec<Cell>], options: &ImportOptions) -> Result<ImportResult, ParseError> {
    let header = locate_header(rows, options.header_scan_rows, options.fallback_scan_rows)?;
    let header_map = map_columns(&header.labels)?;

    let mut diagnostics = vec![format!("header detected at sheet row {}", header.index + 1)];
    if header.by_fallback {
        diagnostics.push("no code or name label recognized; header chosen by width".to_string());
    }
    diagnostics.push(format!(
        "mapped columns: {}",
        describe_map(&header_map, &header.labels)
    ));
    if !header_map.contains_key(&Field::FullName) {
        diagnostics.push("full name built from split name columns".to_string());
    }
    if !header_map.contains_key(&Field::Email) {
        diagnostics.push(format!(
            "no email column; addresses synthesized with @{}",
            options.email_domain
        ));
    }

    let mut records = Vec::new();
    let mut seen_codes = HashSet::<String>::new();
    for (sheet_row, row) in rows.iter().enumerate().skip(header.index + 1) {
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        let code = values::code_text(cell_at(row, header_map.get(&Field::StudentCode).copied()));
        if code.is_empty() {
            continue;
        }
        let full_name = extract_full_name(row, &header_map);
        if values::is_summary_row(&code, &full_name) {
            diagnostics.push(format!("skipped summary row at sheet row {}", sheet_row + 1));
            continue;
        }

        let col = |f: Field| header_map.get(&f).copied();
        let (email, email_synthesized) = match values::optional_text(cell_at(row, col(Field::Email))) {
            Some(e) => (e, false),
            None => (values::synthesize_email(&code, &options.email_domain), true),
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        if full_name.is_empty() {
            errors.push(MSG_MISSING_NAME.to_string());
        }
        if !values::is_valid_email(&email) {
            errors.push(MSG_INVALID_EMAIL.to_string());
        }
        if !seen_codes.insert(code.clone()) {
            warnings.push(MSG_DUPLICATE_CODE.to_string());
        }

        let status = status_for(&errors, &warnings);
        records.push(ParsedRecord {
            row_number: records.len() + 1,
            student_code: code,
            full_name,
            email,
            email_synthesized,
            phone: values::optional_text(cell_at(row, col(Field::Phone))),
            class_name: values::optional_text(cell_at(row, col(Field::ClassName))),
            birth_date: values::parse_birth_date(cell_at(row, col(Field::BirthDate))),
            gender: values::parse_gender(cell_at(row, col(Field::Gender))),
            status,
            errors,
            warnings,
        });
    }

    let summary = ImportSummary::from_records(&records);
    Ok(ImportResult {
        header_row: header.index,
        header_map,
        records,
        summary,
        diagnostics,
        submission: None,
    })
}

fn extract_full_name(row: &[Cell], map: &HeaderMap) -> String {
    if let Some(col) = map.get(&Field::FullName) {
        return squash_spaces(&cell_at(row, Some(*col)).text());
    }
    let last = cell_at(row, map.get(&Field::LastMiddleName).copied()).text();
    let given = cell_at(row, map.get(&Field::GivenName).copied()).text();
    squash_spaces(&format!("{} {}", last, given))
}
