use anyhow::anyhow;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::roster::{ImportResult, ParsedRecord, SubmissionCounts};

/// One student as handed to the roster store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentImport {
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub class_name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
}

impl From<&ParsedRecord> for StudentImport {
    fn from(r: &ParsedRecord) -> Self {
        Self {
            student_code: r.student_code.clone(),
            full_name: r.full_name.clone(),
            email: r.email.clone(),
            phone: r.phone.clone(),
            class_name: r.class_name.clone(),
            birth_date: r.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            gender: r.gender.map(|g| g.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkImportOutcome {
    pub created: usize,
    pub skipped: usize,
    pub added_to_class: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("class not found: {0}")]
    ClassNotFound(String),
    #[error("roster store rejected the batch: {0}")]
    Store(#[from] rusqlite::Error),
}

impl SubmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::ClassNotFound(_) => "not_found",
            SubmissionError::Store(_) => "submission_failed",
        }
    }
}

/// Where imported students end up. Creates missing accounts and attaches
/// every given student to the class, deduplicating by student code.
pub trait RosterStore {
    fn bulk_import_students(
        &mut self,
        class_id: &str,
        students: &[StudentImport],
    ) -> Result<BulkImportOutcome, SubmissionError>;
}

pub struct SqliteRosterStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRosterStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

struct MemberStep {
    created: bool,
    added: bool,
}

fn now_unix_string() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string()
}

fn upsert_member(
    conn: &Connection,
    class_id: &str,
    s: &StudentImport,
    sort_order: i64,
    now: &str,
) -> anyhow::Result<MemberStep> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM profiles WHERE student_code = ?",
            [&s.student_code],
            |r| r.get(0),
        )
        .optional()?;

    let (profile_id, created) = match existing {
        Some(id) => (id, false),
        None => {
            // Emails are stored lowercased; ownership ignores case.
            let email = s.email.to_lowercase();
            let owner: Option<String> = conn
                .query_row(
                    "SELECT student_code FROM profiles WHERE email = ?",
                    [&email],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(owner) = owner {
                return Err(anyhow!("email {} already belongs to {}", email, owner));
            }
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO profiles(id, student_code, full_name, email, phone, class_name, birth_date, gender, role, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, 'student', ?, ?)",
                (
                    &id,
                    &s.student_code,
                    &s.full_name,
                    &email,
                    &s.phone,
                    &s.class_name,
                    &s.birth_date,
                    &s.gender,
                    now,
                    now,
                ),
            )?;
            (id, true)
        }
    };

    let added = conn.execute(
        "INSERT OR IGNORE INTO class_students(class_id, profile_id, sort_order, added_at)
         VALUES(?, ?, ?, ?)",
        (class_id, &profile_id, sort_order, now),
    )? > 0;

    Ok(MemberStep { created, added })
}

impl RosterStore for SqliteRosterStore<'_> {
    fn bulk_import_students(
        &mut self,
        class_id: &str,
        students: &[StudentImport],
    ) -> Result<BulkImportOutcome, SubmissionError> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| r.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(SubmissionError::ClassNotFound(class_id.to_string()));
        }

        let mut tx = self.conn.unchecked_transaction()?;
        let mut next_sort: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM class_students WHERE class_id = ?",
            [class_id],
            |r| r.get(0),
        )?;
        let now = now_unix_string();
        let mut outcome = BulkImportOutcome::default();
        let mut seen = HashSet::<String>::new();

        for s in students {
            if !seen.insert(s.student_code.clone()) {
                outcome.skipped += 1;
                continue;
            }
            // A failing student is rolled back alone; the rest of the batch stays.
            let sp = tx.savepoint()?;
            match upsert_member(&sp, class_id, s, next_sort, &now) {
                Ok(step) => {
                    sp.commit()?;
                    if step.created {
                        outcome.created += 1;
                    } else {
                        outcome.skipped += 1;
                    }
                    if step.added {
                        outcome.added_to_class += 1;
                        next_sort += 1;
                    }
                }
                Err(e) => {
                    drop(sp);
                    log::warn!("student {} not imported: {}", s.student_code, e);
                    outcome.errors.push(format!("{}: {}", s.student_code, e));
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }
}

/// Sends every non-error record to the store as one batch and merges the
/// reported counts into `result`. On failure `result` is left untouched so
/// the same preview can be resubmitted.
pub fn submit_import<S: RosterStore + ?Sized>(
    store: &mut S,
    class_id: &str,
    result: &mut ImportResult,
) -> Result<(), SubmissionError> {
    let batch: Vec<StudentImport> = result.submittable().map(StudentImport::from).collect();
    let outcome = store.bulk_import_students(class_id, &batch)?;
    log::info!(
        "class {}: submitted {}, created {}, skipped {}, added {}, errors {}",
        class_id,
        batch.len(),
        outcome.created,
        outcome.skipped,
        outcome.added_to_class,
        outcome.errors.len()
    );
    result.submission = Some(SubmissionCounts {
        submitted: batch.len(),
        created: outcome.created,
        skipped: outcome.skipped,
        added_to_class: outcome.added_to_class,
        apply_errors: outcome.errors,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::roster::{parse_roster, Cell, ImportOptions};

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|s| Cell::from(*s)).collect()
    }

    fn open_with_class(class_id: &str) -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute(
            "INSERT INTO classes(id, name) VALUES(?, ?)",
            (class_id, "CNTT K21"),
        )
        .expect("class");
        conn
    }

    fn student(code: &str, email: &str) -> StudentImport {
        StudentImport {
            student_code: code.to_string(),
            full_name: format!("Student {}", code),
            email: email.to_string(),
            phone: None,
            class_name: None,
            birth_date: None,
            gender: None,
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        batches: Vec<Vec<StudentImport>>,
        fail: bool,
    }

    impl RosterStore for RecordingStore {
        fn bulk_import_students(
            &mut self,
            class_id: &str,
            students: &[StudentImport],
        ) -> Result<BulkImportOutcome, SubmissionError> {
            if self.fail {
                return Err(SubmissionError::ClassNotFound(class_id.to_string()));
            }
            self.batches.push(students.to_vec());
            Ok(BulkImportOutcome {
                created: students.len(),
                skipped: 0,
                added_to_class: students.len(),
                errors: Vec::new(),
            })
        }
    }

    fn sample_result() -> ImportResult {
        let sheet = vec![
            row(&["MSSV", "Họ tên", "Email"]),
            row(&["21200123", "Nguyễn Văn A", ""]),
            row(&["21200123", "Nguyễn Văn A Duplicate", ""]),
            row(&["21200125", "", ""]),
        ];
        parse_roster(&sheet, &ImportOptions::default()).expect("parse")
    }

    #[test]
    fn adapter_skips_error_rows_and_merges_counts() {
        let mut result = sample_result();
        let mut store = RecordingStore::default();
        submit_import(&mut store, "class-1", &mut result).expect("submit");

        assert_eq!(store.batches.len(), 1);
        let codes: Vec<_> = store.batches[0].iter().map(|s| s.student_code.as_str()).collect();
        assert_eq!(codes, vec!["21200123", "21200123"]);
        let counts = result.submission.expect("counts");
        assert_eq!(counts.submitted, 2);
        assert_eq!(counts.created, 2);
        assert_eq!(counts.added_to_class, 2);
    }

    #[test]
    fn adapter_failure_leaves_result_untouched() {
        let mut result = sample_result();
        let mut store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        assert!(submit_import(&mut store, "class-1", &mut result).is_err());
        assert!(result.submission.is_none());
        assert_eq!(result.records.len(), 3);
    }

    #[test]
    fn sqlite_store_dedupes_within_batch_and_across_runs() {
        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        let batch = vec![
            student("001", "001@dnc.edu.vn"),
            student("001", "001@dnc.edu.vn"),
            student("002", "002@dnc.edu.vn"),
        ];

        let first = store.bulk_import_students("c1", &batch).expect("first import");
        assert_eq!(first.created, 2);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.added_to_class, 2);
        assert!(first.errors.is_empty());

        let second = store.bulk_import_students("c1", &batch).expect("second import");
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(second.added_to_class, 0);

        let members: i64 = conn
            .query_row("SELECT COUNT(*) FROM class_students WHERE class_id = 'c1'", [], |r| r.get(0))
            .expect("count");
        assert_eq!(members, 2);
    }

    #[test]
    fn sqlite_store_reports_email_collisions_per_student() {
        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        let outcome = store
            .bulk_import_students(
                "c1",
                &[
                    student("001", "same@dnc.edu.vn"),
                    student("002", "same@dnc.edu.vn"),
                    student("003", "003@dnc.edu.vn"),
                ],
            )
            .expect("import");
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("002:"));

        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .expect("count");
        assert_eq!(profiles, 2);
    }

    #[test]
    fn existing_account_is_attached_to_another_class() {
        let conn = open_with_class("c1");
        conn.execute("INSERT INTO classes(id, name) VALUES('c2', 'Other')", [])
            .expect("class 2");
        let mut store = SqliteRosterStore::new(&conn);
        store
            .bulk_import_students("c1", &[student("001", "001@dnc.edu.vn")])
            .expect("c1");
        let outcome = store
            .bulk_import_students("c2", &[student("001", "001@dnc.edu.vn")])
            .expect("c2");
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.added_to_class, 1);
    }

    #[test]
    fn codes_differing_in_case_are_distinct_students() {
        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        let same_batch = store
            .bulk_import_students(
                "c1",
                &[student("SV01", "a@dnc.edu.vn"), student("sv01", "b@dnc.edu.vn")],
            )
            .expect("same batch");
        assert_eq!(same_batch.created, 2);
        assert_eq!(same_batch.skipped, 0);

        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        let first = store
            .bulk_import_students("c1", &[student("SV01", "a@dnc.edu.vn")])
            .expect("first apply");
        let second = store
            .bulk_import_students("c1", &[student("sv01", "b@dnc.edu.vn")])
            .expect("second apply");
        assert_eq!(first.created, 1);
        assert_eq!(second.created, 1);
        assert_eq!(second.skipped, 0);

        let again = store
            .bulk_import_students("c1", &[student("SV01", "a@dnc.edu.vn")])
            .expect("repeat apply");
        assert_eq!(again.created, 0);
        assert_eq!(again.skipped, 1);

        let profiles: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))
            .expect("count");
        assert_eq!(profiles, 2);
    }

    #[test]
    fn email_ownership_ignores_case() {
        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        store
            .bulk_import_students("c1", &[student("001", "An.Nguyen@Gmail.com")])
            .expect("first");
        let outcome = store
            .bulk_import_students("c1", &[student("002", "an.nguyen@gmail.com")])
            .expect("second");
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("002:"));

        let stored: String = conn
            .query_row("SELECT email FROM profiles WHERE student_code = '001'", [], |r| r.get(0))
            .expect("email");
        assert_eq!(stored, "an.nguyen@gmail.com");
    }

    #[test]
    fn unknown_class_is_rejected() {
        let conn = open_with_class("c1");
        let mut store = SqliteRosterStore::new(&conn);
        let e = store
            .bulk_import_students("missing", &[student("001", "001@dnc.edu.vn")])
            .unwrap_err();
        assert_eq!(e.code(), "not_found");
    }
}
