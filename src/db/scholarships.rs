//! Scholarship beneficiary register

use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use super::query::{self, assign, write_error, CategoryCount, ListQuery, Page, Table, YearCount};
use super::{deserialize_amount, validate_amount};
use crate::error::RecordsError;

const SCHOLARSHIP_COLUMNS: &str = "
    id, serial, name, father_name, mother_name, sang, post, upazila, zila, phone,
    passing_year, school, gpa, category, financial_year, amount, status,
    created_at, updated_at
";

const SCHOLARSHIPS: Table = Table {
    name: "scholarship",
    columns: SCHOLARSHIP_COLUMNS,
    list_columns: &["name", "father_name", "mother_name", "school", "phone"],
    score_columns: &[
        ("name", 10),
        ("father_name", 5),
        ("mother_name", 3),
        ("school", 2),
        ("upazila", 1),
        ("phone", 1),
    ],
    match_columns: &["name", "father_name", "mother_name", "school", "phone", "upazila"],
    name_column: "name",
    list_order: "id DESC",
};

/// Scholarship row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarshipRow {
    pub id: i64,
    pub serial: Option<String>,
    pub name: String,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub sang: Option<String>,
    pub post: Option<String>,
    pub upazila: Option<String>,
    pub zila: Option<String>,
    pub phone: Option<String>,
    pub passing_year: Option<String>,
    pub school: Option<String>,
    pub gpa: Option<String>,
    pub category: Option<String>,
    pub financial_year: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ScholarshipRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            serial: row.get("serial")?,
            name: row.get("name")?,
            father_name: row.get("father_name")?,
            mother_name: row.get("mother_name")?,
            sang: row.get("sang")?,
            post: row.get("post")?,
            upazila: row.get("upazila")?,
            zila: row.get("zila")?,
            phone: row.get("phone")?,
            passing_year: row.get("passing_year")?,
            school: row.get("school")?,
            gpa: row.get("gpa")?,
            category: row.get("category")?,
            financial_year: row.get("financial_year")?,
            amount: row.get("amount")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Scholarship fields accepted on create and update.
///
/// On update only the supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScholarshipInput {
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub sang: Option<String>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub upazila: Option<String>,
    #[serde(default)]
    pub zila: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub passing_year: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub gpa: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub financial_year: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ScholarshipInput {
    /// Check an edit. A supplied name must not be blank.
    pub fn validate(&self) -> Result<(), RecordsError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(RecordsError::InvalidInput("name cannot be empty".into()));
        }
        validate_amount("amount", self.amount)
    }

    /// Check a new record. The name is required.
    pub fn validate_new(&self) -> Result<(), RecordsError> {
        if self.name.is_none() {
            return Err(RecordsError::InvalidInput("name is required".into()));
        }
        self.validate()
    }

    /// Column assignments for the supplied fields; `name` is the trimmed name
    fn assignments<'a>(&'a self, name: &'a Option<&'a str>) -> Vec<(&'static str, &'a dyn ToSql)> {
        let mut sets = vec![];
        assign(&mut sets, "serial", &self.serial);
        assign(&mut sets, "name", name);
        assign(&mut sets, "father_name", &self.father_name);
        assign(&mut sets, "mother_name", &self.mother_name);
        assign(&mut sets, "sang", &self.sang);
        assign(&mut sets, "post", &self.post);
        assign(&mut sets, "upazila", &self.upazila);
        assign(&mut sets, "zila", &self.zila);
        assign(&mut sets, "phone", &self.phone);
        assign(&mut sets, "passing_year", &self.passing_year);
        assign(&mut sets, "school", &self.school);
        assign(&mut sets, "gpa", &self.gpa);
        assign(&mut sets, "category", &self.category);
        assign(&mut sets, "financial_year", &self.financial_year);
        assign(&mut sets, "amount", &self.amount);
        assign(&mut sets, "status", &self.status);
        sets
    }
}

/// Aggregate scholarship statistics
#[derive(Debug, Clone, Serialize)]
pub struct ScholarshipStats {
    pub total_count: i64,
    pub total_amount: f64,
    #[serde(rename = "byCategory")]
    pub by_category: Vec<CategoryCount>,
    #[serde(rename = "byYear")]
    pub by_year: Vec<YearCount>,
}

pub fn get_scholarship(conn: &Connection, id: i64) -> Result<Option<ScholarshipRow>, RecordsError> {
    let sql = format!("SELECT {} FROM scholarship WHERE id = ?", SCHOLARSHIP_COLUMNS);
    let rows = query::query_rows(conn, &sql, &[&id as &dyn ToSql], ScholarshipRow::from_row)?;
    Ok(rows.into_iter().next())
}

/// Paginated listing, newest first
pub fn list_scholarships(
    conn: &Connection,
    query: &ListQuery,
) -> Result<Page<ScholarshipRow>, RecordsError> {
    query::list_page(conn, &SCHOLARSHIPS, query, ScholarshipRow::from_row)
}

/// Keyword search, name matches weighted highest
pub fn search_scholarships(
    conn: &Connection,
    search_query: &str,
    year: Option<&str>,
) -> Result<Vec<ScholarshipRow>, RecordsError> {
    query::keyword_search(conn, &SCHOLARSHIPS, search_query, year, ScholarshipRow::from_row)
}

pub fn scholarship_years(conn: &Connection) -> Result<Vec<String>, RecordsError> {
    query::distinct_years(conn, &SCHOLARSHIPS)
}

pub fn scholarship_stats(conn: &Connection) -> Result<ScholarshipStats, RecordsError> {
    let (total_count, total_amount): (i64, f64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM scholarship",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| RecordsError::db("Stats query failed", e))?;

    Ok(ScholarshipStats {
        total_count,
        total_amount,
        by_category: query::category_counts(conn, &SCHOLARSHIPS)?,
        by_year: query::year_counts(conn, &SCHOLARSHIPS)?,
    })
}

pub fn create_scholarship(conn: &Connection, input: &ScholarshipInput) -> Result<i64, RecordsError> {
    input.validate_new()?;

    conn.execute(
        r#"
        INSERT INTO scholarship (
            serial, name, father_name, mother_name, sang, post, upazila, zila, phone,
            passing_year, school, gpa, category, financial_year, amount, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.serial,
            input.name.as_deref().map(str::trim),
            input.father_name,
            input.mother_name,
            input.sang,
            input.post,
            input.upazila,
            input.zila,
            input.phone,
            input.passing_year,
            input.school,
            input.gpa,
            input.category,
            input.financial_year,
            input.amount,
            input.status,
        ],
    )
    .map_err(|e| write_error("Insert failed", e))?;

    Ok(conn.last_insert_rowid())
}

/// Returns false when the record does not exist
pub fn update_scholarship(
    conn: &Connection,
    id: i64,
    input: &ScholarshipInput,
) -> Result<bool, RecordsError> {
    input.validate()?;
    let name = input.name.as_deref().map(str::trim);
    query::update_columns(conn, &SCHOLARSHIPS, id, &input.assignments(&name))
}

pub fn delete_scholarship(conn: &Connection, id: i64) -> Result<bool, RecordsError> {
    query::delete_row(conn, &SCHOLARSHIPS, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn student(name: &str) -> ScholarshipInput {
        ScholarshipInput {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let conn = test_conn();
        let id = create_scholarship(&conn, &ScholarshipInput {
            name: Some(" Ayesha Khatun ".into()),
            school: Some("Kushtia Govt Girls".into()),
            gpa: Some("5.00".into()),
            amount: Some(3000.0),
            ..Default::default()
        }).unwrap();

        let row = get_scholarship(&conn, id).unwrap().unwrap();
        assert_eq!(row.name, "Ayesha Khatun");
        assert_eq!(row.gpa.as_deref(), Some("5.00"));
        assert_eq!(row.amount, Some(3000.0));
        assert!(get_scholarship(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_create_requires_name() {
        let conn = test_conn();
        let err = create_scholarship(&conn, &ScholarshipInput::default()).unwrap_err();
        assert!(matches!(err, RecordsError::InvalidInput(_)));

        let err = create_scholarship(&conn, &student("  ")).unwrap_err();
        assert!(matches!(err, RecordsError::InvalidInput(_)));
    }

    #[test]
    fn test_search_ranks_name_matches_first() {
        let conn = test_conn();

        let mut school_hit = student("Nasrin");
        school_hit.school = Some("Rahman Memorial School".into());
        create_scholarship(&conn, &school_hit).unwrap();

        let mut father_hit = student("Sumaiya");
        father_hit.father_name = Some("Abdur Rahman".into());
        create_scholarship(&conn, &father_hit).unwrap();

        create_scholarship(&conn, &student("Rahman Ali")).unwrap();
        create_scholarship(&conn, &student("Unrelated")).unwrap();

        let results = search_scholarships(&conn, "rahman", None).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Rahman Ali", "Sumaiya", "Nasrin"]);
    }

    #[test]
    fn test_search_caps_results() {
        let conn = test_conn();
        for i in 0..15 {
            create_scholarship(&conn, &student(&format!("Karim {:02}", i))).unwrap();
        }

        let results = search_scholarships(&conn, "karim", None).unwrap();
        assert_eq!(results.len(), query::SEARCH_LIMIT as usize);
        // Equal scores fall back to name order
        assert_eq!(results[0].name, "Karim 00");
    }

    #[test]
    fn test_list_pagination_newest_first() {
        let conn = test_conn();
        for i in 0..12 {
            let mut s = student(&format!("Student {}", i));
            s.financial_year = Some(if i < 5 { "2023-24" } else { "2024-25" }.into());
            create_scholarship(&conn, &s).unwrap();
        }

        let page = list_scholarships(&conn, &ListQuery {
            page: Some("2".into()),
            limit: Some("5".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.data[0].name, "Student 6");

        let filtered = list_scholarships(&conn, &ListQuery {
            year: Some("2023-24".into()),
            search: Some("student 1".into()),
            ..Default::default()
        }).unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.data[0].name, "Student 1");
    }

    #[test]
    fn test_years_and_stats() {
        let conn = test_conn();
        for (name, year, category, amount) in [
            ("A", "2023-24", "SSC", 2000.0),
            ("B", "2024-25", "SSC", 2500.0),
            ("C", "2024-25", "HSC", 3000.0),
        ] {
            create_scholarship(&conn, &ScholarshipInput {
                name: Some(name.into()),
                financial_year: Some(year.into()),
                category: Some(category.into()),
                amount: Some(amount),
                ..Default::default()
            }).unwrap();
        }

        assert_eq!(scholarship_years(&conn).unwrap(), vec!["2024-25", "2023-24"]);

        let stats = scholarship_stats(&conn).unwrap();
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.total_amount, 7500.0);
        assert_eq!(stats.by_category.len(), 2);
        assert_eq!(stats.by_year.len(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let conn = test_conn();
        let id = create_scholarship(&conn, &student("Rina")).unwrap();

        let edit = ScholarshipInput {
            status: Some("paid".into()),
            ..Default::default()
        };
        assert!(update_scholarship(&conn, id, &edit).unwrap());
        let row = get_scholarship(&conn, id).unwrap().unwrap();
        assert_eq!(row.status.as_deref(), Some("paid"));
        assert_eq!(row.name, "Rina");

        let blank = ScholarshipInput {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(update_scholarship(&conn, id, &blank), Err(RecordsError::InvalidInput(_))));
        assert!(!update_scholarship(&conn, 999, &edit).unwrap());

        assert!(delete_scholarship(&conn, id).unwrap());
        assert!(!delete_scholarship(&conn, id).unwrap());
    }
}
