//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::RecordsError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), RecordsError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        if current_version < 2 {
            create_beneficiary_tables(conn)?;
        }
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, RecordsError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| RecordsError::db("Failed to create schema_version table", e))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), RecordsError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| RecordsError::db("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| RecordsError::db("Failed to set schema_version", e))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), RecordsError> {
    conn.execute_batch(PROJECTS_SCHEMA)
        .map_err(|e| RecordsError::db("Failed to create projects table", e))?;

    conn.execute_batch(PROGRESS_LOG_SCHEMA)
        .map_err(|e| RecordsError::db("Failed to create progress log table", e))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| RecordsError::db("Failed to create indexes", e))?;

    create_beneficiary_tables(conn)
}

/// v2: scholarship and humanitarian aid registers
fn create_beneficiary_tables(conn: &Connection) -> Result<(), RecordsError> {
    conn.execute_batch(SCHOLARSHIP_SCHEMA)
        .map_err(|e| RecordsError::db("Failed to create scholarship table", e))?;

    conn.execute_batch(HUMANITARIAN_SCHEMA)
        .map_err(|e| RecordsError::db("Failed to create humanitarian_aid table", e))?;

    Ok(())
}

const PROJECTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_code TEXT UNIQUE,
    project_name TEXT NOT NULL,

    -- Sanctioned budget; never touched by progress submissions
    allocation_amount REAL NOT NULL DEFAULT 0 CHECK (allocation_amount >= 0),
    fund_type TEXT,
    financial_year TEXT,
    implementation_method TEXT,
    upazila TEXT,
    project_type TEXT,

    -- Live progress snapshot, mirrors the newest progress log row
    released_amount REAL NOT NULL DEFAULT 0 CHECK (released_amount >= 0),
    current_status TEXT,
    progress_percentage INTEGER NOT NULL DEFAULT 0
        CHECK (progress_percentage BETWEEN 0 AND 100),
    is_completed INTEGER NOT NULL DEFAULT 0,
    is_delayed INTEGER NOT NULL DEFAULT 0,

    start_date TEXT,
    expected_end_date TEXT,
    actual_end_date TEXT,
    remarks TEXT,

    created_by INTEGER,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
"#;

const PROGRESS_LOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS project_progress_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    progress_percentage INTEGER NOT NULL
        CHECK (progress_percentage BETWEEN 0 AND 100),
    released_amount REAL NOT NULL CHECK (released_amount >= 0),
    current_status TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0,
    is_delayed INTEGER NOT NULL DEFAULT 0,
    note TEXT,
    logged_by INTEGER,
    logged_at TEXT NOT NULL
);

-- Log rows are history: inserts only
CREATE TRIGGER IF NOT EXISTS project_progress_log_append_only
BEFORE UPDATE ON project_progress_log
BEGIN
    SELECT RAISE(ABORT, 'project_progress_log is append-only');
END;
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_projects_financial_year ON projects(financial_year);
CREATE INDEX IF NOT EXISTS idx_projects_project_type ON projects(project_type);
CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects(created_at);
CREATE INDEX IF NOT EXISTS idx_progress_log_project ON project_progress_log(project_id, logged_at);
"#;

const SCHOLARSHIP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS scholarship (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial TEXT,
    name TEXT NOT NULL,
    father_name TEXT,
    mother_name TEXT,
    sang TEXT,
    post TEXT,
    upazila TEXT,
    zila TEXT,
    phone TEXT,
    passing_year TEXT,
    school TEXT,
    gpa TEXT,
    category TEXT,
    financial_year TEXT,
    amount REAL CHECK (amount IS NULL OR amount >= 0),
    status TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_scholarship_financial_year ON scholarship(financial_year);
CREATE INDEX IF NOT EXISTS idx_scholarship_category ON scholarship(category);
"#;

const HUMANITARIAN_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS humanitarian_aid (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    financial_year TEXT,
    name TEXT NOT NULL,
    father_name TEXT,
    mother_name TEXT,
    nid_birth_reg_no TEXT,
    profession TEXT,
    relation_to_beneficiary TEXT,
    address TEXT,
    upazila TEXT,
    zila TEXT,
    mobile TEXT,
    category TEXT,
    amount_eng REAL CHECK (amount_eng IS NULL OR amount_eng >= 0),
    bank TEXT,
    check_no TEXT,
    check_date TEXT,
    reference TEXT,
    application_details TEXT,
    status TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_humanitarian_financial_year ON humanitarian_aid(financial_year);
CREATE INDEX IF NOT EXISTS idx_humanitarian_category ON humanitarian_aid(category);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_v1_database() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        conn.execute_batch(PROJECTS_SCHEMA).unwrap();
        conn.execute_batch(PROGRESS_LOG_SCHEMA).unwrap();
        set_schema_version(&conn, 1).unwrap();
        conn.execute("INSERT INTO projects (project_name) VALUES ('Road')", []).unwrap();

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        conn.execute("INSERT INTO scholarship (name) VALUES ('Rahim')", []).unwrap();
        conn.execute("INSERT INTO humanitarian_aid (name) VALUES ('Karim')", []).unwrap();
        let projects: i64 = conn
            .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .unwrap();
        assert_eq!(projects, 1);
    }

    #[test]
    fn test_progress_log_rejects_updates() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute("INSERT INTO projects (project_name) VALUES ('Road')", []).unwrap();
        conn.execute(
            "INSERT INTO project_progress_log
                (project_id, progress_percentage, released_amount, current_status, logged_at)
             VALUES (1, 10, 0, 'x', '2026-01-01T00:00:00.000Z')",
            [],
        ).unwrap();

        let result = conn.execute("UPDATE project_progress_log SET progress_percentage = 99", []);
        assert!(result.is_err());
    }
}
