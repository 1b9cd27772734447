//! Spreadsheet roster ingestion: header detection, column inference, and
//! per-row extraction/validation of student records.

mod cell;
mod error;
mod extract;
mod header;
mod normalize;
mod types;
mod values;

pub use cell::Cell;
pub use extract::parse_roster;
pub use types::{
    ImportOptions, ImportResult, ParsedRecord, SubmissionCounts, DEFAULT_EMAIL_DOMAIN,
    DEFAULT_FALLBACK_SCAN_ROWS, DEFAULT_HEADER_SCAN_ROWS,
};

#[cfg(test)]
pub use header::Field;
#[cfg(test)]
pub use types::RecordStatus;
