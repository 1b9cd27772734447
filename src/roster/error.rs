use thiserror::Error;

/// Structural failure of a sheet. Fatal to one import attempt; the user has
/// to pick a different file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("file empty or unrecognized: the sheet has fewer than 2 rows")]
    EmptySheet,
    #[error("file empty or unrecognized: no header row found")]
    HeaderNotFound,
    #[error("missing required column: student code (MSSV / Mã sinh viên)")]
    MissingCodeColumn,
    #[error("missing required column: full name (Họ tên) or Họ đệm + Tên")]
    MissingNameColumn,
}

impl ParseError {
    /// Stable machine-readable tag for `error.details.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::EmptySheet => "empty_sheet",
            ParseError::HeaderNotFound => "header_not_found",
            ParseError::MissingCodeColumn => "missing_code_column",
            ParseError::MissingNameColumn => "missing_name_column",
        }
    }
}
