//! SQLite storage for project records, their progress log and the
//! beneficiary registers
//!
//! ## Tables
//!
//! - `projects` - Infrastructure projects with their live progress snapshot
//! - `project_progress_log` - Append-only progress history, one row per submission
//! - `scholarship` - Scholarship beneficiaries
//! - `humanitarian_aid` - Humanitarian aid disbursements
//!
//! The snapshot columns of `projects` (`progress_percentage`,
//! `released_amount`, `current_status`, `is_completed`, `is_delayed`) always
//! mirror the newest `project_progress_log` row for that project. Both are
//! written in the same transaction by [`progress_log::record_progress`].

pub mod schema;
pub mod query;
pub mod projects;
pub mod progress_log;
pub mod scholarships;
pub mod humanitarian;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::error::RecordsError;

/// File name of the database inside the data directory
const DB_FILE_NAME: &str = "records.db";

/// SQLite database for project records
pub struct RecordsDb {
    conn: Mutex<Connection>,
}

impl RecordsDb {
    /// Open or create the records database
    pub fn open(data_dir: &Path) -> Result<Self, RecordsError> {
        let db_path = data_dir.join(DB_FILE_NAME);
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| RecordsError::db("Failed to open SQLite", e))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| RecordsError::db("Failed to set PRAGMA", e))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, RecordsError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| RecordsError::db("Failed to open in-memory SQLite", e))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RecordsError> {
        // Progress log rows cascade away with their project
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| RecordsError::db("Failed to enable foreign keys", e))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read against the shared connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RecordsError>
    where
        F: FnOnce(&Connection) -> Result<T, RecordsError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| RecordsError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, RecordsError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RecordsError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| RecordsError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, RecordsError> {
        self.with_conn(|conn| {
            let project_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
                .map_err(|e| RecordsError::db("Query failed", e))?;

            let progress_log_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM project_progress_log", [], |row| row.get(0))
                .map_err(|e| RecordsError::db("Query failed", e))?;

            Ok(DbStats {
                project_count: project_count as u64,
                progress_log_count: progress_log_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub project_count: u64,
    pub progress_log_count: u64,
}

/// Server-assigned timestamp, millisecond precision so log rows order stably
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Accept `true`/`false`, `1`/`0` and their string forms for flag fields.
/// The admin forms post checkbox values as numbers or strings.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0),
        Some(Value::String(s)) => !matches!(s.trim(), "" | "0" | "false"),
        Some(_) => {
            return Err(serde::de::Error::custom("expected a boolean flag"));
        }
    })
}

/// Accept an amount as a JSON number or a numeric string
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid amount: {}", s))),
        Some(_) => Err(serde::de::Error::custom("expected a numeric amount")),
    }
}

/// Reject negative or non-finite money amounts
pub(crate) fn validate_amount(field: &str, amount: Option<f64>) -> Result<(), RecordsError> {
    match amount {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RecordsError::InvalidInput(format!(
            "{} must be a non-negative number",
            field
        ))),
        _ => Ok(()),
    }
}

// Re-exports
pub use query::{ListQuery, Page, YearCount, CategoryCount};
pub use projects::{ProjectKey, ProjectRow, CreateProjectInput, UpdateProjectInput, ProjectStats};
pub use scholarships::{ScholarshipRow, ScholarshipInput, ScholarshipStats};
pub use humanitarian::{HumanitarianRow, HumanitarianInput, HumanitarianStats};
pub use progress_log::{ProgressLogEntry, ProgressSubmission, ProjectFunding};
