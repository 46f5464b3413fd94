//! Project CRUD, listing, search and aggregate queries

use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use super::query::{self, assign, non_empty, write_error, ListQuery, Page, Table, YearCount};
use super::{deserialize_amount, deserialize_flag, validate_amount};
use crate::error::RecordsError;
use crate::progress;

const PROJECT_COLUMNS: &str = "
    id, project_code, project_name, allocation_amount, released_amount, fund_type,
    financial_year, implementation_method, upazila, project_type, current_status,
    progress_percentage, is_completed, is_delayed, start_date, expected_end_date,
    actual_end_date, remarks, created_by, created_at, updated_at
";

/// Column weights for keyword relevance scoring
const SEARCH_WEIGHTS: &[(&str, i64)] = &[
    ("project_name", 10),
    ("project_code", 3),
    ("upazila", 5),
    ("project_type", 3),
    ("current_status", 2),
    ("implementation_method", 2),
    ("fund_type", 1),
    ("remarks", 1),
];

const PROJECTS: Table = Table {
    name: "projects",
    columns: PROJECT_COLUMNS,
    list_columns: &["project_name", "upazila", "project_type", "current_status", "project_code"],
    score_columns: SEARCH_WEIGHTS,
    match_columns: &[
        "project_name",
        "project_code",
        "upazila",
        "project_type",
        "current_status",
        "implementation_method",
        "fund_type",
        "remarks",
    ],
    name_column: "project_name",
    list_order: "created_at DESC, id DESC",
};

/// Project row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: i64,
    pub project_code: Option<String>,
    pub project_name: String,
    pub allocation_amount: f64,
    pub released_amount: f64,
    pub fund_type: Option<String>,
    pub financial_year: Option<String>,
    pub implementation_method: Option<String>,
    pub upazila: Option<String>,
    pub project_type: Option<String>,
    pub current_status: Option<String>,
    pub progress_percentage: u8,
    pub is_completed: bool,
    pub is_delayed: bool,
    pub start_date: Option<String>,
    pub expected_end_date: Option<String>,
    pub actual_end_date: Option<String>,
    pub remarks: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            project_code: row.get("project_code")?,
            project_name: row.get("project_name")?,
            allocation_amount: row.get("allocation_amount")?,
            released_amount: row.get("released_amount")?,
            fund_type: row.get("fund_type")?,
            financial_year: row.get("financial_year")?,
            implementation_method: row.get("implementation_method")?,
            upazila: row.get("upazila")?,
            project_type: row.get("project_type")?,
            current_status: row.get("current_status")?,
            progress_percentage: row.get("progress_percentage")?,
            is_completed: row.get("is_completed")?,
            is_delayed: row.get("is_delayed")?,
            start_date: row.get("start_date")?,
            expected_end_date: row.get("expected_end_date")?,
            actual_end_date: row.get("actual_end_date")?,
            remarks: row.get("remarks")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// How a caller refers to a project: internal id or external code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectKey {
    Id(i64),
    Code(String),
}

impl ProjectKey {
    /// Parse a decoded path segment. All-digit keys are internal ids.
    pub fn parse(raw: &str) -> Result<Self, RecordsError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RecordsError::InvalidInput("Invalid project ID".into()));
        }

        if raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse::<i64>() {
                return Ok(ProjectKey::Id(id));
            }
        }

        Ok(ProjectKey::Code(raw.to_string()))
    }
}

impl std::fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectKey::Id(id) => write!(f, "{}", id),
            ProjectKey::Code(code) => f.write_str(code),
        }
    }
}

/// Trimmed project code, `None` when blank.
///
/// Codes address projects in URL paths, so `/` is rejected.
fn normalize_code(code: &str) -> Result<Option<&str>, RecordsError> {
    let code = non_empty(Some(code));
    if code.is_some_and(|c| c.contains('/')) {
        return Err(RecordsError::InvalidInput("project_code cannot contain '/'".into()));
    }
    Ok(code)
}

/// Input for creating a project
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProjectInput {
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub project_name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub allocation_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub released_amount: Option<f64>,
    #[serde(default)]
    pub fund_type: Option<String>,
    #[serde(default)]
    pub financial_year: Option<String>,
    #[serde(default)]
    pub implementation_method: Option<String>,
    #[serde(default)]
    pub upazila: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_completed: bool,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_delayed: bool,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub expected_end_date: Option<String>,
    #[serde(default)]
    pub actual_end_date: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl CreateProjectInput {
    pub fn validate(&self) -> Result<(), RecordsError> {
        if self.project_name.trim().is_empty() {
            return Err(RecordsError::InvalidInput("project_name is required".into()));
        }
        if let Some(ref code) = self.project_code {
            normalize_code(code)?;
        }
        validate_amount("allocation_amount", self.allocation_amount)?;
        validate_amount("released_amount", self.released_amount)?;
        Ok(())
    }
}

/// Editable project fields.
///
/// The progress snapshot (`progress_percentage`, `released_amount`,
/// `current_status`, `is_completed`, `is_delayed`) is deliberately absent:
/// it only changes through a progress submission, so those keys in an edit
/// body are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProjectInput {
    #[serde(default)]
    pub project_code: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub allocation_amount: Option<f64>,
    #[serde(default)]
    pub fund_type: Option<String>,
    #[serde(default)]
    pub financial_year: Option<String>,
    #[serde(default)]
    pub implementation_method: Option<String>,
    #[serde(default)]
    pub upazila: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub expected_end_date: Option<String>,
    #[serde(default)]
    pub actual_end_date: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl UpdateProjectInput {
    pub fn validate(&self) -> Result<(), RecordsError> {
        if let Some(ref name) = self.project_name {
            if name.trim().is_empty() {
                return Err(RecordsError::InvalidInput("project_name cannot be empty".into()));
            }
        }
        if let Some(ref code) = self.project_code {
            normalize_code(code)?;
        }
        validate_amount("allocation_amount", self.allocation_amount)
    }

    /// Column assignments for the supplied fields. `code` is the normalized
    /// `project_code`, where `Some(None)` clears it.
    fn assignments<'a>(
        &'a self,
        code: &'a Option<Option<&'a str>>,
    ) -> Vec<(&'static str, &'a dyn ToSql)> {
        let mut sets = vec![];
        assign(&mut sets, "project_code", code);
        assign(&mut sets, "project_name", &self.project_name);
        assign(&mut sets, "allocation_amount", &self.allocation_amount);
        assign(&mut sets, "fund_type", &self.fund_type);
        assign(&mut sets, "financial_year", &self.financial_year);
        assign(&mut sets, "implementation_method", &self.implementation_method);
        assign(&mut sets, "upazila", &self.upazila);
        assign(&mut sets, "project_type", &self.project_type);
        assign(&mut sets, "start_date", &self.start_date);
        assign(&mut sets, "expected_end_date", &self.expected_end_date);
        assign(&mut sets, "actual_end_date", &self.actual_end_date);
        assign(&mut sets, "remarks", &self.remarks);
        sets
    }
}

/// Project count per type
#[derive(Debug, Clone, Serialize)]
pub struct TypeCount {
    pub project_type: Option<String>,
    pub count: i64,
}

/// Aggregate project statistics
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub total_count: i64,
    pub total_allocation: f64,
    pub total_released: f64,
    pub completed_count: i64,
    pub delayed_count: i64,
    #[serde(rename = "byType")]
    pub by_type: Vec<TypeCount>,
    #[serde(rename = "byYear")]
    pub by_year: Vec<YearCount>,
}

// ============================================================================
// Read Operations
// ============================================================================

/// Get project by internal id
pub fn get_project(conn: &Connection, id: i64) -> Result<Option<ProjectRow>, RecordsError> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
    let rows = query::query_rows(conn, &sql, &[&id as &dyn ToSql], ProjectRow::from_row)?;
    Ok(rows.into_iter().next())
}

/// Get project by id or external code
pub fn find_project(conn: &Connection, key: &ProjectKey) -> Result<Option<ProjectRow>, RecordsError> {
    match key {
        ProjectKey::Id(id) => {
            if let Some(project) = get_project(conn, *id)? {
                return Ok(Some(project));
            }
            // Numeric external codes are legal too
            find_by_code(conn, &id.to_string())
        }
        ProjectKey::Code(code) => find_by_code(conn, code),
    }
}

fn find_by_code(conn: &Connection, code: &str) -> Result<Option<ProjectRow>, RecordsError> {
    let sql = format!("SELECT {} FROM projects WHERE project_code = ?", PROJECT_COLUMNS);
    let rows = query::query_rows(conn, &sql, &[&code as &dyn ToSql], ProjectRow::from_row)?;
    Ok(rows.into_iter().next())
}

/// Paginated listing, newest first, with optional text and year filters
pub fn list_projects(conn: &Connection, query: &ListQuery) -> Result<Page<ProjectRow>, RecordsError> {
    query::list_page(conn, &PROJECTS, query, ProjectRow::from_row)
}

/// Keyword search ranked by weighted column matches
pub fn search_projects(
    conn: &Connection,
    search_query: &str,
    year: Option<&str>,
) -> Result<Vec<ProjectRow>, RecordsError> {
    query::keyword_search(conn, &PROJECTS, search_query, year, ProjectRow::from_row)
}

/// Distinct financial years, newest first
pub fn financial_years(conn: &Connection) -> Result<Vec<String>, RecordsError> {
    query::distinct_years(conn, &PROJECTS)
}

/// Totals plus per-type and per-year counts
pub fn project_stats(conn: &Connection) -> Result<ProjectStats, RecordsError> {
    let (total_count, total_allocation, total_released, completed_count, delayed_count): (i64, f64, f64, i64, i64) = conn
        .query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(allocation_amount), 0),
                    COALESCE(SUM(released_amount), 0),
                    COALESCE(SUM(is_completed), 0),
                    COALESCE(SUM(is_delayed), 0)
             FROM projects",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .map_err(|e| RecordsError::db("Stats query failed", e))?;

    let by_type = query::grouped_counts(conn, &PROJECTS, "project_type")?
        .into_iter()
        .map(|(project_type, count)| TypeCount { project_type, count })
        .collect();

    Ok(ProjectStats {
        total_count,
        total_allocation,
        total_released,
        completed_count,
        delayed_count,
        by_type,
        by_year: query::year_counts(conn, &PROJECTS)?,
    })
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create a project and return its internal id.
///
/// The initial `progress_percentage` is derived from the initial snapshot
/// fields; no progress log row is written.
pub fn create_project(
    conn: &Connection,
    input: &CreateProjectInput,
    created_by: Option<i64>,
) -> Result<i64, RecordsError> {
    input.validate()?;

    let allocation = input.allocation_amount.unwrap_or(0.0);
    let released = input.released_amount.unwrap_or(0.0);
    let status = non_empty(input.current_status.as_deref());

    let pct = progress::calculate(
        status.unwrap_or(""),
        input.implementation_method.as_deref(),
        allocation,
        released,
        input.is_completed,
        input.is_delayed,
    );

    let code = match input.project_code.as_deref() {
        Some(code) => normalize_code(code)?,
        None => None,
    };

    conn.execute(
        r#"
        INSERT INTO projects (
            project_code, project_name, allocation_amount, released_amount, fund_type,
            financial_year, implementation_method, upazila, project_type, current_status,
            progress_percentage, is_completed, is_delayed, start_date, expected_end_date,
            actual_end_date, remarks, created_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            code,
            input.project_name.trim(),
            allocation,
            released,
            input.fund_type,
            input.financial_year,
            input.implementation_method,
            input.upazila,
            input.project_type,
            status,
            pct,
            input.is_completed,
            input.is_delayed,
            input.start_date,
            input.expected_end_date,
            input.actual_end_date,
            input.remarks,
            created_by,
        ],
    )
    .map_err(|e| write_error("Insert failed", e))?;

    Ok(conn.last_insert_rowid())
}

/// Apply an edit. Returns false when the project does not exist.
pub fn update_project(
    conn: &Connection,
    id: i64,
    input: &UpdateProjectInput,
) -> Result<bool, RecordsError> {
    input.validate()?;

    let code = match input.project_code.as_deref() {
        Some(code) => Some(normalize_code(code)?),
        None => None,
    };

    query::update_columns(conn, &PROJECTS, id, &input.assignments(&code))
}

/// Delete a project and, by cascade, its progress log
pub fn delete_project(conn: &Connection, id: i64) -> Result<bool, RecordsError> {
    query::delete_row(conn, &PROJECTS, id)
}
