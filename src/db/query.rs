//! Listing, keyword search and write helpers shared by the record tables

use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::now_timestamp;
use crate::error::RecordsError;

/// Default and maximum page size for listings
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Keyword search returns at most this many rows
pub const SEARCH_LIMIT: u32 = 10;

/// Keywords and queries shorter than this (in characters) are ignored
pub(crate) const MIN_SEARCH_CHARS: usize = 2;

/// Static description of a record table for the shared queries.
///
/// Every name here is a compile-time constant, so formatting them into SQL
/// is safe.
pub(crate) struct Table {
    pub name: &'static str,
    pub columns: &'static str,
    /// Columns matched by the `search` filter of a listing
    pub list_columns: &'static [&'static str],
    /// Columns scored by keyword search, with their weights
    pub score_columns: &'static [(&'static str, i64)],
    /// Columns any keyword may match in keyword search
    pub match_columns: &'static [&'static str],
    /// Tie-break for equally relevant search hits
    pub name_column: &'static str,
    /// ORDER BY of a listing
    pub list_order: &'static str,
}

/// List query parameters, taken leniently from the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

impl ListQuery {
    /// 1-based page, defaulting to 1 for missing or unparsable values
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }

    /// Page size, defaulting to 20 and capped at 100
    pub fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT)
    }

    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_SEARCH_CHARS)
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

/// Row count per financial year
#[derive(Debug, Clone, Serialize)]
pub struct YearCount {
    pub financial_year: Option<String>,
    pub count: i64,
}

/// Row count per beneficiary category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: Option<String>,
    pub count: i64,
}

/// `None` for missing or blank text, the trimmed text otherwise
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn year_filter(year: Option<&str>) -> Option<&str> {
    non_empty(year).filter(|y| *y != "all")
}

/// Map a failed write; constraint violations are the caller's fault
pub(crate) fn write_error(context: &str, err: rusqlite::Error) -> RecordsError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RecordsError::InvalidInput(format!("Record violates a constraint: {}", err))
        }
        err => RecordsError::db(context, err),
    }
}

/// Queue `column = value` for an update when the field was supplied
pub(crate) fn assign<'a, T: ToSql>(
    sets: &mut Vec<(&'static str, &'a dyn ToSql)>,
    column: &'static str,
    value: &'a Option<T>,
) {
    if let Some(v) = value {
        sets.push((column, v));
    }
}

pub(crate) fn query_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    from_row: F,
) -> Result<Vec<T>, RecordsError>
where
    F: Fn(&Row) -> Result<T, rusqlite::Error>,
{
    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| RecordsError::db("Prepare failed", e))?;

    let rows = stmt
        .query_map(params, |row| from_row(row))
        .map_err(|e| RecordsError::db("Query failed", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RecordsError::db("Row parse failed", e))?;

    Ok(rows)
}

/// Paginated listing with optional text and year filters
pub(crate) fn list_page<T, F>(
    conn: &Connection,
    table: &Table,
    query: &ListQuery,
    from_row: F,
) -> Result<Page<T>, RecordsError>
where
    F: Fn(&Row) -> Result<T, rusqlite::Error>,
{
    let page = query.page();
    let limit = query.limit();
    let offset = i64::from(page - 1) * i64::from(limit);

    let mut conditions = vec![];
    let mut params: Vec<Box<dyn ToSql>> = vec![];

    if let Some(search) = query.search_term() {
        let matches = table
            .list_columns
            .iter()
            .map(|column| format!("{} LIKE ?", column))
            .collect::<Vec<_>>()
            .join(" OR ");
        conditions.push(format!("({})", matches));

        let pattern = format!("%{}%", search);
        for _ in table.list_columns {
            params.push(Box::new(pattern.clone()));
        }
    }

    if let Some(year) = year_filter(query.year.as_deref()) {
        conditions.push("financial_year = ?".to_string());
        params.push(Box::new(year.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM {}{}", table.name, where_clause);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let total: i64 = conn
        .query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))
        .map_err(|e| RecordsError::db("Count query failed", e))?;

    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
        table.columns, table.name, where_clause, table.list_order
    );
    params.push(Box::new(i64::from(limit)));
    params.push(Box::new(offset));

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let data = query_rows(conn, &sql, &param_refs, from_row)?;

    let limit_i64 = i64::from(limit);
    Ok(Page {
        data,
        total,
        page,
        limit,
        total_pages: (total + limit_i64 - 1) / limit_i64,
    })
}

/// Keyword search ranked by weighted column matches.
///
/// Every keyword of at least two characters adds its column weights to a
/// row's score; rows matching any keyword are returned, best first.
pub(crate) fn keyword_search<T, F>(
    conn: &Connection,
    table: &Table,
    search_query: &str,
    year: Option<&str>,
    from_row: F,
) -> Result<Vec<T>, RecordsError>
where
    F: Fn(&Row) -> Result<T, rusqlite::Error>,
{
    let search_query = search_query.trim();
    if search_query.chars().count() < MIN_SEARCH_CHARS {
        return Ok(vec![]);
    }

    let keywords: Vec<&str> = search_query
        .split_whitespace()
        .filter(|k| k.chars().count() >= MIN_SEARCH_CHARS)
        .collect();
    if keywords.is_empty() {
        return Ok(vec![]);
    }

    let score = table
        .score_columns
        .iter()
        .map(|(column, weight)| format!("(CASE WHEN {} LIKE ? THEN {} ELSE 0 END)", column, weight))
        .collect::<Vec<_>>()
        .join(" + ");
    let matches = table
        .match_columns
        .iter()
        .map(|column| format!("{} LIKE ?", column))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut score_parts = vec![];
    let mut where_parts = vec![];
    let mut score_params: Vec<Box<dyn ToSql>> = vec![];
    let mut where_params: Vec<Box<dyn ToSql>> = vec![];

    for keyword in &keywords {
        let pattern = format!("%{}%", keyword);

        score_parts.push(format!("({})", score));
        where_parts.push(format!("({})", matches));

        for _ in table.score_columns {
            score_params.push(Box::new(pattern.clone()));
        }
        for _ in table.match_columns {
            where_params.push(Box::new(pattern.clone()));
        }
    }

    let mut sql = format!(
        "SELECT {}, ({}) AS relevance_score FROM {} WHERE ({})",
        table.columns,
        score_parts.join(" + "),
        table.name,
        where_parts.join(" OR "),
    );

    let mut params = score_params;
    params.append(&mut where_params);

    if let Some(year) = year_filter(year) {
        sql.push_str(" AND financial_year = ?");
        params.push(Box::new(year.to_string()));
    }

    sql.push_str(&format!(
        " ORDER BY relevance_score DESC, {} ASC LIMIT {}",
        table.name_column, SEARCH_LIMIT
    ));

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    query_rows(conn, &sql, &param_refs, from_row)
}

/// Distinct financial years, newest first
pub(crate) fn distinct_years(conn: &Connection, table: &Table) -> Result<Vec<String>, RecordsError> {
    let sql = format!(
        "SELECT DISTINCT financial_year FROM {}
         WHERE financial_year IS NOT NULL ORDER BY financial_year DESC",
        table.name
    );
    query_rows(conn, &sql, &[], |row| row.get(0))
}

/// `(value, count)` per distinct value of `column`
pub(crate) fn grouped_counts(
    conn: &Connection,
    table: &Table,
    column: &'static str,
) -> Result<Vec<(Option<String>, i64)>, RecordsError> {
    let sql = format!(
        "SELECT {col}, COUNT(*) FROM {table} GROUP BY {col}",
        col = column,
        table = table.name
    );
    query_rows(conn, &sql, &[], |row| Ok((row.get(0)?, row.get(1)?)))
}

pub(crate) fn year_counts(conn: &Connection, table: &Table) -> Result<Vec<YearCount>, RecordsError> {
    Ok(grouped_counts(conn, table, "financial_year")?
        .into_iter()
        .map(|(financial_year, count)| YearCount { financial_year, count })
        .collect())
}

pub(crate) fn category_counts(conn: &Connection, table: &Table) -> Result<Vec<CategoryCount>, RecordsError> {
    Ok(grouped_counts(conn, table, "category")?
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect())
}

/// Apply `assignments` plus a fresh `updated_at` to one row.
///
/// Returns false when the row does not exist.
pub(crate) fn update_columns(
    conn: &Connection,
    table: &Table,
    id: i64,
    assignments: &[(&'static str, &dyn ToSql)],
) -> Result<bool, RecordsError> {
    if assignments.is_empty() {
        // Nothing to change; still report whether the row exists
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", table.name);
        let found = conn
            .query_row(&sql, params![id], |_| Ok(()))
            .optional()
            .map_err(|e| RecordsError::db("Query failed", e))?;
        return Ok(found.is_some());
    }

    let set_clause = assignments
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .chain(std::iter::once("updated_at = ?".to_string()))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE id = ?", table.name, set_clause);

    let now = now_timestamp();
    let mut param_refs: Vec<&dyn ToSql> = assignments.iter().map(|(_, v)| *v).collect();
    param_refs.push(&now);
    param_refs.push(&id);

    let changes = conn
        .execute(&sql, param_refs.as_slice())
        .map_err(|e| write_error("Update failed", e))?;

    Ok(changes > 0)
}

/// Delete one row by id. Returns false when it did not exist.
pub(crate) fn delete_row(conn: &Connection, table: &Table, id: i64) -> Result<bool, RecordsError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", table.name);
    let changes = conn
        .execute(&sql, params![id])
        .map_err(|e| RecordsError::db("Delete failed", e))?;

    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_normalization() {
        let q = ListQuery {
            page: Some("abc".into()),
            limit: Some("500".into()),
            ..Default::default()
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), MAX_PAGE_LIMIT);

        let q = ListQuery {
            limit: Some("0".into()),
            search: Some(" x ".into()),
            ..Default::default()
        };
        assert_eq!(q.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(q.search_term(), None);
    }

    #[test]
    fn test_year_filter() {
        assert_eq!(year_filter(Some(" 2024-25 ")), Some("2024-25"));
        assert_eq!(year_filter(Some("all")), None);
        assert_eq!(year_filter(Some("  ")), None);
        assert_eq!(year_filter(None), None);
    }

    #[test]
    fn test_write_error_mapping() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (code TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();

        let dup = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(matches!(write_error("Insert failed", dup), RecordsError::InvalidInput(_)));

        let missing = conn.execute("INSERT INTO nope VALUES (1)", []).unwrap_err();
        assert!(matches!(write_error("Insert failed", missing), RecordsError::Database(_)));
    }
}
