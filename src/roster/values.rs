use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::cell::Cell;
use super::normalize::normalize_label;
use super::types::Gender;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static DMY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{4})$").expect("dmy regex"));
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").expect("iso regex"));

// Day zero of spreadsheet serials once the 1900 leap-year bug is accounted for.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const MAX_SERIAL: f64 = 2_958_465.0;

const SUMMARY_CODE_MARKERS: [&str; 3] = ["tong", "total", "summary"];
const SUMMARY_NAME_MARKERS: [&str; 4] = ["tong_cong", "tong_so", "total", "summary"];

/// Identifying code of a row. Readers that hand numeric codes over as text
/// sometimes keep a float suffix (`"21200123.0"`); that suffix is dropped.
pub fn code_text(cell: &Cell) -> String {
    let raw = cell.text();
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed).trim().to_string()
}

pub fn optional_text(cell: &Cell) -> Option<String> {
    let t = cell.text();
    let t = t.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn synthesize_email(code: &str, domain: &str) -> String {
    format!("{}@{}", code.to_lowercase(), domain.trim_start_matches('@'))
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Accepts a spreadsheet date serial, `D/M/YYYY`, `D-M-YYYY` or ISO
/// `YYYY-MM-DD`. Anything else is treated as "no birth date".
pub fn parse_birth_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(n) => serial_to_date(*n),
        Cell::Text(s) => parse_date_text(s.trim()),
        Cell::Bool(_) | Cell::Empty => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if let Some(c) = DMY_RE.captures(s) {
        let day = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let year = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(c) = ISO_RE.captures(s) {
        let year = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let day = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

pub fn parse_gender(cell: &Cell) -> Option<Gender> {
    match normalize_label(&cell.text()).as_str() {
        "nam" | "male" | "m" => Some(Gender::Male),
        "nu" | "female" | "f" => Some(Gender::Female),
        _ => None,
    }
}

/// Footer rows such as "Tổng cộng: 45 sinh viên" must not become students.
/// Codes never legitimately contain the markers. Names count when a marker's
/// tokens appear as a contiguous run anywhere, so a lone surname "Tống" is kept.
pub fn is_summary_row(code: &str, name: &str) -> bool {
    let code = normalize_label(code);
    if SUMMARY_CODE_MARKERS.iter().any(|m| code.contains(m)) {
        return true;
    }
    let name = normalize_label(name);
    let tokens: Vec<&str> = name.split('_').filter(|t| !t.is_empty()).collect();
    SUMMARY_NAME_MARKERS.iter().any(|m| {
        let marker: Vec<&str> = m.split('_').collect();
        tokens.windows(marker.len()).any(|w| w == marker.as_slice())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn code_drops_float_suffix() {
        assert_eq!(code_text(&Cell::Text(" 21200123.0 ".into())), "21200123");
        assert_eq!(code_text(&Cell::Number(21200123.0)), "21200123");
        assert_eq!(code_text(&Cell::Text("SV001".into())), "SV001");
        assert_eq!(code_text(&Cell::Empty), "");
    }

    #[test]
    fn synthesized_email_is_deterministic() {
        let a = synthesize_email("21200123", "dnc.edu.vn");
        let b = synthesize_email("21200123", "dnc.edu.vn");
        assert_eq!(a, "21200123@dnc.edu.vn");
        assert_eq!(a, b);
        assert_eq!(synthesize_email("SV01", "@school.edu"), "sv01@school.edu");
    }

    #[test]
    fn email_format_check() {
        assert!(is_valid_email("a.b@dnc.edu.vn"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@x.vn"));
        assert!(!is_valid_email("a@localhost"));
    }

    #[test]
    fn text_dates_parse_day_first() {
        assert_eq!(
            parse_birth_date(&Cell::Text("15/03/2003".into())),
            Some(ymd(2003, 3, 15))
        );
        assert_eq!(
            parse_birth_date(&Cell::Text("5-1-2004".into())),
            Some(ymd(2004, 1, 5))
        );
        assert_eq!(
            parse_birth_date(&Cell::Text("2003-03-15T00:00:00".into())),
            Some(ymd(2003, 3, 15))
        );
    }

    #[test]
    fn unparsable_dates_are_absent() {
        assert_eq!(parse_birth_date(&Cell::Text("N/A".into())), None);
        assert_eq!(parse_birth_date(&Cell::Text("31/02/2003".into())), None);
        assert_eq!(parse_birth_date(&Cell::Number(-4.0)), None);
        assert_eq!(parse_birth_date(&Cell::Empty), None);
    }

    #[test]
    fn serials_use_spreadsheet_epoch() {
        assert_eq!(serial_to_date(37695.0), Some(ymd(2003, 3, 15)));
        assert_eq!(serial_to_date(1.0), Some(ymd(1899, 12, 31)));
        assert_eq!(serial_to_date(37695.75), Some(ymd(2003, 3, 15)));
    }

    #[test]
    fn gender_vocabulary() {
        assert_eq!(parse_gender(&Cell::Text("Nam".into())), Some(Gender::Male));
        assert_eq!(parse_gender(&Cell::Text("Nữ".into())), Some(Gender::Female));
        assert_eq!(parse_gender(&Cell::Text("F".into())), Some(Gender::Female));
        assert_eq!(parse_gender(&Cell::Text("male".into())), Some(Gender::Male));
        assert_eq!(parse_gender(&Cell::Text("khác".into())), None);
        assert_eq!(parse_gender(&Cell::Empty), None);
    }

    #[test]
    fn summary_rows_detected() {
        assert!(is_summary_row("Tổng cộng", ""));
        assert!(is_summary_row("x", "Tổng cộng: 45 sinh viên"));
        assert!(is_summary_row("TOTAL", ""));
        assert!(!is_summary_row("21200123", "Tống Văn An"));
        assert!(is_summary_row("", "Sĩ số tổng cộng"));
        assert!(is_summary_row("", "Grand total: 45"));
        assert!(!is_summary_row("21200124", "Nguyễn Tống"));
        assert!(!is_summary_row("21200125", "Totalia Nguyễn"));
    }
}
