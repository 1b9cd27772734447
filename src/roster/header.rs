use std::collections::BTreeMap;

use serde::Serialize;

use super::cell::{non_blank_count, Cell};
use super::error::ParseError;
use super::normalize::normalize_label;

/// Canonical student attributes the importer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    StudentCode,
    FullName,
    LastMiddleName,
    GivenName,
    Email,
    Phone,
    ClassName,
    BirthDate,
    Gender,
}

impl Field {
    /// Mapping order. Earlier fields claim a column before later ones.
    pub const ALL: [Field; 9] = [
        Field::StudentCode,
        Field::FullName,
        Field::LastMiddleName,
        Field::GivenName,
        Field::Email,
        Field::Phone,
        Field::ClassName,
        Field::BirthDate,
        Field::Gender,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::StudentCode => "student_code",
            Field::FullName => "full_name",
            Field::LastMiddleName => "last_middle_name",
            Field::GivenName => "given_name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::ClassName => "class_name",
            Field::BirthDate => "birth_date",
            Field::Gender => "gender",
        }
    }

    fn is_name(self) -> bool {
        matches!(
            self,
            Field::FullName | Field::LastMiddleName | Field::GivenName
        )
    }
}

/// Predicate over a normalized header label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Contains(&'static str),
    Equals(&'static str),
}

impl Matcher {
    pub fn matches(self, label: &str) -> bool {
        match self {
            Matcher::Contains(fragment) => label.contains(fragment),
            Matcher::Equals(text) => label == text,
        }
    }
}

/// Every supported header alias, in evaluation order.
pub const HEADER_ALIASES: &[(Field, Matcher)] = &[
    (Field::StudentCode, Matcher::Contains("ma_sinh_vien")),
    (Field::StudentCode, Matcher::Contains("ma_so_sinh_vien")),
    (Field::StudentCode, Matcher::Contains("mssv")),
    (Field::StudentCode, Matcher::Contains("ma_sv")),
    (Field::StudentCode, Matcher::Contains("student_code")),
    (Field::StudentCode, Matcher::Contains("student_id")),
    (Field::StudentCode, Matcher::Equals("ma")),
    (Field::FullName, Matcher::Contains("ho_ten")),
    (Field::FullName, Matcher::Contains("ho_va_ten")),
    (Field::FullName, Matcher::Contains("ten_sinh_vien")),
    (Field::FullName, Matcher::Contains("full_name")),
    (Field::FullName, Matcher::Contains("fullname")),
    (Field::FullName, Matcher::Equals("name")),
    (Field::LastMiddleName, Matcher::Contains("ho_dem")),
    (Field::LastMiddleName, Matcher::Contains("ho_lot")),
    (Field::LastMiddleName, Matcher::Contains("last_name")),
    (Field::LastMiddleName, Matcher::Equals("ho")),
    (Field::GivenName, Matcher::Equals("ten")),
    (Field::GivenName, Matcher::Contains("first_name")),
    (Field::GivenName, Matcher::Contains("given_name")),
    (Field::Email, Matcher::Contains("email")),
    (Field::Email, Matcher::Contains("e_mail")),
    (Field::Email, Matcher::Equals("mail")),
    (Field::Phone, Matcher::Contains("dien_thoai")),
    (Field::Phone, Matcher::Contains("sdt")),
    (Field::Phone, Matcher::Contains("phone")),
    (Field::Phone, Matcher::Equals("dt")),
    (Field::ClassName, Matcher::Contains("lop")),
    (Field::ClassName, Matcher::Contains("class")),
    (Field::BirthDate, Matcher::Contains("ngay_sinh")),
    (Field::BirthDate, Matcher::Contains("birth")),
    (Field::BirthDate, Matcher::Equals("dob")),
    (Field::Gender, Matcher::Contains("gioi_tinh")),
    (Field::Gender, Matcher::Contains("gender")),
    (Field::Gender, Matcher::Equals("phai")),
    (Field::Gender, Matcher::Equals("sex")),
];

pub fn field_matches(field: Field, label: &str) -> bool {
    !label.is_empty()
        && HEADER_ALIASES
            .iter()
            .any(|(f, m)| *f == field && m.matches(label))
}

pub type HeaderMap = BTreeMap<Field, usize>;

#[derive(Debug, Clone)]
pub struct HeaderRow {
    /// Zero-based index of the header row in the sheet.
    pub index: usize,
    /// Normalized label per column; blank cells are `""`.
    pub labels: Vec<String>,
    pub by_fallback: bool,
}

fn normalized_labels(row: &[Cell]) -> Vec<String> {
    row.iter().map(|c| normalize_label(&c.text())).collect()
}

fn looks_like_header(labels: &[String]) -> bool {
    labels.iter().any(|label| {
        field_matches(Field::StudentCode, label)
            || Field::ALL
                .iter()
                .any(|f| f.is_name() && field_matches(*f, label))
    })
}

/// Finds the header row: the first of the top `scan_rows` rows that has at
/// least two filled cells and a code-like or name-like label. Falls back to
/// the first of the top `fallback_rows` rows with more than two filled cells.
pub fn locate_header(
    rows: &[Vec<Cell>],
    scan_rows: usize,
    fallback_rows: usize,
) -> Result<HeaderRow, ParseError> {
    if rows.len() < 2 {
        return Err(ParseError::EmptySheet);
    }

    for (index, row) in rows.iter().enumerate().take(scan_rows) {
        if non_blank_count(row) < 2 {
            continue;
        }
        let labels = normalized_labels(row);
        if looks_like_header(&labels) {
            return Ok(HeaderRow {
                index,
                labels,
                by_fallback: false,
            });
        }
    }

    rows.iter()
        .enumerate()
        .take(fallback_rows)
        .find(|(_, row)| non_blank_count(row) > 2)
        .map(|(index, row)| HeaderRow {
            index,
            labels: normalized_labels(row),
            by_fallback: true,
        })
        .ok_or(ParseError::HeaderNotFound)
}

/// Builds the field -> column map. Columns are scanned left to right per
/// field and a column claimed by an earlier field is never reused.
pub fn map_columns(labels: &[String]) -> Result<HeaderMap, ParseError> {
    let mut map = HeaderMap::new();
    let mut claimed = vec![false; labels.len()];
    for field in Field::ALL {
        let found = labels
            .iter()
            .enumerate()
            .find(|(col, label)| !claimed[*col] && field_matches(field, label));
        if let Some((col, _)) = found {
            claimed[col] = true;
            map.insert(field, col);
        }
    }

    if !map.contains_key(&Field::StudentCode) {
        return Err(ParseError::MissingCodeColumn);
    }
    if !map.contains_key(&Field::FullName) && !map.contains_key(&Field::GivenName) {
        return Err(ParseError::MissingNameColumn);
    }
    Ok(map)
}

pub fn describe_map(map: &HeaderMap, labels: &[String]) -> String {
    map.iter()
        .map(|(field, col)| {
            let label = labels.get(*col).map(String::as_str).unwrap_or("");
            format!("{}={}({})", field.key(), col, label)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
