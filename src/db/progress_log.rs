//! Project progress log and the transactional progress recorder
//!
//! A progress submission appends one immutable `project_progress_log` row
//! and overwrites the project's snapshot columns with the same values. Both
//! writes share one IMMEDIATE transaction, so readers see either neither or
//! both. Concurrent submissions for one project serialize on the write lock;
//! the later commit owns the snapshot and both log rows survive.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{deserialize_amount, deserialize_flag, now_timestamp, validate_amount};
use crate::error::RecordsError;
use crate::progress;

/// Progress log row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    pub id: i64,
    pub project_id: i64,
    pub progress_percentage: u8,
    pub released_amount: f64,
    pub current_status: String,
    pub is_completed: bool,
    pub is_delayed: bool,
    pub note: Option<String>,
    pub logged_by: Option<i64>,
    pub logged_at: String,
}

impl ProgressLogEntry {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            progress_percentage: row.get("progress_percentage")?,
            released_amount: row.get("released_amount")?,
            current_status: row.get("current_status")?,
            is_completed: row.get("is_completed")?,
            is_delayed: row.get("is_delayed")?,
            note: row.get("note")?,
            logged_by: row.get("logged_by")?,
            logged_at: row.get("logged_at")?,
        })
    }
}

/// A progress update as submitted by an administrator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressSubmission {
    /// Cumulative released amount; None carries the stored value forward
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub released_amount: Option<f64>,
    #[serde(default)]
    pub current_status: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_completed: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_delayed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl ProgressSubmission {
    pub fn new(current_status: impl Into<String>) -> Self {
        Self {
            current_status: current_status.into(),
            ..Default::default()
        }
    }

    /// Check the shape of the submission. Runs before any transaction opens.
    pub fn validate(&self) -> Result<(), RecordsError> {
        if self.current_status.trim().is_empty() {
            return Err(RecordsError::InvalidInput("current_status is required".into()));
        }
        validate_amount("released_amount", self.released_amount)
    }

    fn status(&self) -> &str {
        self.current_status.trim()
    }

    fn note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// The project fields the calculator needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFunding {
    pub allocation_amount: f64,
    pub released_amount: f64,
    pub implementation_method: Option<String>,
}

// ============================================================================
// Read Operations
// ============================================================================

/// Fetch allocation, released amount and method for a project
pub fn get_project_funding(
    conn: &Connection,
    project_id: i64,
) -> Result<Option<ProjectFunding>, RecordsError> {
    conn.query_row(
        "SELECT allocation_amount, released_amount, implementation_method
         FROM projects WHERE id = ?",
        params![project_id],
        |row| {
            Ok(ProjectFunding {
                allocation_amount: row.get(0)?,
                released_amount: row.get(1)?,
                implementation_method: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(|e| RecordsError::db("Query failed", e))
}

/// Progress history of a project, oldest first
pub fn get_progress_log(
    conn: &Connection,
    project_id: i64,
) -> Result<Vec<ProgressLogEntry>, RecordsError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, project_id, progress_percentage, released_amount, current_status,
                    is_completed, is_delayed, note, logged_by, logged_at
             FROM project_progress_log
             WHERE project_id = ?
             ORDER BY logged_at ASC, id ASC",
        )
        .map_err(|e| RecordsError::db("Prepare failed", e))?;

    let entries = stmt
        .query_map(params![project_id], |row| ProgressLogEntry::from_row(row))
        .map_err(|e| RecordsError::db("Query failed", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RecordsError::db("Row parse failed", e))?;

    Ok(entries)
}

/// Newest log entry of a project, if any.
///
/// "Newest" is the last row written, which is the one the snapshot mirrors;
/// `logged_at` can tie or step backwards across clock adjustments.
pub fn latest_progress(
    conn: &Connection,
    project_id: i64,
) -> Result<Option<ProgressLogEntry>, RecordsError> {
    conn.query_row(
        "SELECT id, project_id, progress_percentage, released_amount, current_status,
                is_completed, is_delayed, note, logged_by, logged_at
         FROM project_progress_log
         WHERE project_id = ?
         ORDER BY id DESC
         LIMIT 1",
        params![project_id],
        |row| ProgressLogEntry::from_row(row),
    )
    .optional()
    .map_err(|e| RecordsError::db("Query failed", e))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Record a progress submission and return the calculated percentage.
///
/// All-or-nothing: on any error the transaction is dropped uncommitted,
/// leaving neither a log row nor a snapshot change.
pub fn record_progress(
    conn: &mut Connection,
    project_id: i64,
    submission: &ProgressSubmission,
    logged_by: i64,
) -> Result<u8, RecordsError> {
    submission.validate()?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| RecordsError::db("Transaction failed", e))?;

    let funding = get_project_funding(&tx, project_id)?
        .ok_or_else(|| RecordsError::NotFound(format!("Project {}", project_id)))?;

    let released_amount = submission.released_amount.unwrap_or(funding.released_amount);
    let status = submission.status();

    let pct = progress::calculate(
        status,
        funding.implementation_method.as_deref(),
        funding.allocation_amount,
        released_amount,
        submission.is_completed,
        submission.is_delayed,
    );

    debug!(
        project_id,
        base_released = funding.released_amount,
        released_amount,
        pct,
        "Calculated progress"
    );

    let logged_at = now_timestamp();

    tx.execute(
        r#"
        INSERT INTO project_progress_log (
            project_id, progress_percentage, released_amount, current_status,
            is_completed, is_delayed, note, logged_by, logged_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            project_id,
            pct,
            released_amount,
            status,
            submission.is_completed,
            submission.is_delayed,
            submission.note(),
            logged_by,
            logged_at,
        ],
    )
    .map_err(|e| RecordsError::db("Progress log insert failed", e))?;

    let changes = tx
        .execute(
            r#"
            UPDATE projects SET
                progress_percentage = ?, released_amount = ?, current_status = ?,
                is_completed = ?, is_delayed = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![
                pct,
                released_amount,
                status,
                submission.is_completed,
                submission.is_delayed,
                logged_at,
                project_id,
            ],
        )
        .map_err(|e| RecordsError::db("Project snapshot update failed", e))?;

    if changes != 1 {
        return Err(RecordsError::NotFound(format!("Project {}", project_id)));
    }

    tx.commit()
        .map_err(|e| RecordsError::db("Commit failed", e))?;

    info!(project_id, progress = pct, logged_by, "Recorded project progress");

    Ok(pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::projects::{self, CreateProjectInput};
    use crate::db::schema;
    use crate::progress::status;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn tender_project(conn: &Connection, allocation: f64, released: f64) -> i64 {
        projects::create_project(conn, &CreateProjectInput {
            project_name: "Union road".into(),
            allocation_amount: Some(allocation),
            released_amount: Some(released),
            implementation_method: Some("টেন্ডার".into()),
            current_status: Some(status::TENDER_FLOATING.into()),
            ..Default::default()
        }, None).unwrap()
    }

    fn log_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM project_progress_log", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_record_updates_snapshot_and_log() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 0.0);

        let submission = ProgressSubmission {
            released_amount: Some(500.0),
            note: Some("  first bill  ".into()),
            ..ProgressSubmission::new(status::ONGOING)
        };
        let pct = record_progress(&mut conn, id, &submission, 3).unwrap();
        assert_eq!(pct, 54);

        let project = projects::get_project(&conn, id).unwrap().unwrap();
        let entry = latest_progress(&conn, id).unwrap().unwrap();

        assert_eq!(project.progress_percentage, entry.progress_percentage);
        assert_eq!(project.released_amount, entry.released_amount);
        assert_eq!(project.current_status.as_deref(), Some(entry.current_status.as_str()));
        assert_eq!(project.is_completed, entry.is_completed);
        assert_eq!(project.is_delayed, entry.is_delayed);
        assert_eq!(project.allocation_amount, 1000.0);

        assert_eq!(entry.note.as_deref(), Some("first bill"));
        assert_eq!(entry.logged_by, Some(3));
        assert_eq!(log_count(&conn), 1);
    }

    #[test]
    fn test_missing_released_carries_forward() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 1000.0);

        let pct = record_progress(&mut conn, id, &ProgressSubmission::new(status::ONGOING), 1).unwrap();
        // Full release carried forward: round(55 * 0.75 + 25) = 66
        assert_eq!(pct, 66);

        let entry = latest_progress(&conn, id).unwrap().unwrap();
        assert_eq!(entry.released_amount, 1000.0);
        assert_eq!(projects::get_project(&conn, id).unwrap().unwrap().released_amount, 1000.0);
    }

    #[test]
    fn test_unknown_project_is_not_found() {
        let mut conn = test_conn();
        let err = record_progress(&mut conn, 404, &ProgressSubmission::new(status::ONGOING), 1)
            .unwrap_err();

        assert!(matches!(err, RecordsError::NotFound(_)));
        assert_eq!(log_count(&conn), 0);
    }

    #[test]
    fn test_blank_status_is_rejected_before_write() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 0.0);

        let err = record_progress(&mut conn, id, &ProgressSubmission::new("   "), 1).unwrap_err();
        assert!(matches!(err, RecordsError::InvalidInput(_)));

        let negative = ProgressSubmission {
            released_amount: Some(-1.0),
            ..ProgressSubmission::new(status::ONGOING)
        };
        assert!(matches!(
            record_progress(&mut conn, id, &negative, 1),
            Err(RecordsError::InvalidInput(_))
        ));
        assert_eq!(log_count(&conn), 0);
    }

    #[test]
    fn test_failed_snapshot_update_rolls_back_log() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 200.0);
        let before = projects::get_project(&conn, id).unwrap().unwrap();

        conn.execute_batch(
            "CREATE TRIGGER fail_snapshot BEFORE UPDATE ON projects
             BEGIN SELECT RAISE(ABORT, 'simulated store failure'); END;",
        ).unwrap();

        let submission = ProgressSubmission {
            released_amount: Some(900.0),
            is_delayed: true,
            ..ProgressSubmission::new(status::PARTIALLY_COMPLETE)
        };
        let err = record_progress(&mut conn, id, &submission, 1).unwrap_err();
        assert!(matches!(err, RecordsError::Database(_)));

        assert_eq!(log_count(&conn), 0);
        let after = projects::get_project(&conn, id).unwrap().unwrap();
        assert_eq!(after.progress_percentage, before.progress_percentage);
        assert_eq!(after.released_amount, before.released_amount);
        assert_eq!(after.current_status, before.current_status);
        assert_eq!(after.is_delayed, before.is_delayed);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn test_log_is_ordered_and_reproducible() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 2000.0, 0.0);

        let steps = [
            (status::TENDER_EVALUATION, None, false, false),
            (status::ONGOING, Some(800.0), false, false),
            (status::ONGOING, Some(2000.0), false, true),
            (status::FINAL_BILLING, None, false, false),
            ("anything", None, true, false),
        ];

        for (s, released, completed, delayed) in steps {
            let submission = ProgressSubmission {
                released_amount: released,
                is_completed: completed,
                is_delayed: delayed,
                ..ProgressSubmission::new(s)
            };
            record_progress(&mut conn, id, &submission, 9).unwrap();
        }

        let log = get_progress_log(&conn, id).unwrap();
        assert_eq!(log.len(), steps.len());
        assert!(log.windows(2).all(|w| w[0].id < w[1].id && w[0].logged_at <= w[1].logged_at));

        let funding = get_project_funding(&conn, id).unwrap().unwrap();
        for entry in &log {
            let recomputed = progress::calculate(
                &entry.current_status,
                funding.implementation_method.as_deref(),
                funding.allocation_amount,
                entry.released_amount,
                entry.is_completed,
                entry.is_delayed,
            );
            assert_eq!(recomputed, entry.progress_percentage);
        }

        let pcts: Vec<u8> = log.iter().map(|e| e.progress_percentage).collect();
        // 15 | round(41.25 + 10) = 51 | delayed, capped at 55 | round(67.5 + 25) = 93 | 100
        assert_eq!(pcts, vec![15, 51, 55, 93, 100]);

        let project = projects::get_project(&conn, id).unwrap().unwrap();
        assert_eq!(project.progress_percentage, 100);
        assert!(project.is_completed);
    }

    #[test]
    fn test_latest_is_last_written_despite_clock_skew() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 0.0);
        record_progress(&mut conn, id, &ProgressSubmission::new(status::ONGOING), 1).unwrap();

        // A row written later whose timestamp sorts earlier
        conn.execute(
            "INSERT INTO project_progress_log
                (project_id, progress_percentage, released_amount, current_status, logged_at)
             VALUES (?, 77, 0, 'late write', '2000-01-01T00:00:00.000Z')",
            params![id],
        ).unwrap();

        let latest = latest_progress(&conn, id).unwrap().unwrap();
        assert_eq!(latest.current_status, "late write");
        assert_eq!(latest.progress_percentage, 77);

        // History stays in timestamp order
        let log = get_progress_log(&conn, id).unwrap();
        assert_eq!(log[0].current_status, "late write");
        assert_eq!(log[1].current_status, status::ONGOING);
    }

    #[test]
    fn test_delete_project_cascades_log() {
        let mut conn = test_conn();
        let id = tender_project(&conn, 1000.0, 0.0);
        record_progress(&mut conn, id, &ProgressSubmission::new(status::ONGOING), 1).unwrap();

        assert!(projects::delete_project(&conn, id).unwrap());
        assert_eq!(log_count(&conn), 0);
    }

    #[test]
    fn test_submission_deserialize() {
        let submission: ProgressSubmission = serde_json::from_value(serde_json::json!({
            "released_amount": "1500",
            "current_status": status::ONGOING,
            "is_completed": 0,
            "is_delayed": 1,
            "note": ""
        })).unwrap();

        assert_eq!(submission.released_amount, Some(1500.0));
        assert!(!submission.is_completed);
        assert!(submission.is_delayed);
        assert_eq!(submission.note(), None);
        assert!(submission.validate().is_ok());
    }
}
