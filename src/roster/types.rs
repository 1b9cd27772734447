use chrono::NaiveDate;
use serde::Serialize;

use super::header::HeaderMap;

pub const DEFAULT_EMAIL_DOMAIN: &str = "dnc.edu.vn";
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 10;
pub const DEFAULT_FALLBACK_SCAN_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Domain used when a row has no email of its own.
    pub email_domain: String,
    pub header_scan_rows: usize,
    pub fallback_scan_rows: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            fallback_scan_rows: DEFAULT_FALLBACK_SCAN_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Valid,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRecord {
    pub row_number: usize,
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    pub email_synthesized: bool,
    pub phone: Option<String>,
    pub class_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub status: RecordStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParsedRecord {
    pub fn is_submittable(&self) -> bool {
        self.status != RecordStatus::Error
    }
}

pub fn status_for(errors: &[String], warnings: &[String]) -> RecordStatus {
    if !errors.is_empty() {
        RecordStatus::Error
    } else if !warnings.is_empty() {
        RecordStatus::Warning
    } else {
        RecordStatus::Valid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
}

impl ImportSummary {
    pub fn from_records(records: &[ParsedRecord]) -> Self {
        let mut summary = ImportSummary {
            total: records.len(),
            ..Default::default()
        };
        for r in records {
            match r.status {
                RecordStatus::Valid => summary.valid += 1,
                RecordStatus::Warning => summary.warning += 1,
                RecordStatus::Error => summary.error += 1,
            }
        }
        summary
    }
}

/// Counts reported back by the roster store after a batch import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionCounts {
    pub submitted: usize,
    pub created: usize,
    pub skipped: usize,
    pub added_to_class: usize,
    pub apply_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub header_row: usize,
    pub header_map: HeaderMap,
    pub records: Vec<ParsedRecord>,
    pub summary: ImportSummary,
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionCounts>,
}

impl ImportResult {
    /// Records that go to the roster store: everything not in `error`.
    pub fn submittable(&self) -> impl Iterator<Item = &ParsedRecord> {
        self.records.iter().filter(|r| r.is_submittable())
    }
}
