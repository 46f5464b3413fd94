//! Humanitarian aid register
//!
//! One row per disbursement: the recipient, who they are to the
//! beneficiary, and the cheque that paid them.

use rusqlite::{params, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use super::query::{self, assign, write_error, CategoryCount, ListQuery, Page, Table, YearCount};
use super::{deserialize_amount, validate_amount};
use crate::error::RecordsError;

const HUMANITARIAN_COLUMNS: &str = "
    id, financial_year, name, father_name, mother_name, nid_birth_reg_no, profession,
    relation_to_beneficiary, address, upazila, zila, mobile, category, amount_eng,
    bank, check_no, check_date, reference, application_details, status,
    created_at, updated_at
";

const HUMANITARIAN: Table = Table {
    name: "humanitarian_aid",
    columns: HUMANITARIAN_COLUMNS,
    list_columns: &["name", "father_name", "mother_name", "mobile", "nid_birth_reg_no"],
    score_columns: &[
        ("name", 10),
        ("father_name", 5),
        ("mother_name", 3),
        ("address", 1),
        ("upazila", 1),
        ("mobile", 1),
        ("category", 1),
        ("nid_birth_reg_no", 1),
    ],
    match_columns: &[
        "name",
        "father_name",
        "mother_name",
        "nid_birth_reg_no",
        "profession",
        "address",
        "upazila",
        "mobile",
        "category",
        "bank",
        "check_no",
        "reference",
        "application_details",
    ],
    name_column: "name",
    list_order: "id DESC",
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanitarianRow {
    pub id: i64,
    pub financial_year: Option<String>,
    pub name: String,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub nid_birth_reg_no: Option<String>,
    pub profession: Option<String>,
    pub relation_to_beneficiary: Option<String>,
    pub address: Option<String>,
    pub upazila: Option<String>,
    pub zila: Option<String>,
    pub mobile: Option<String>,
    pub category: Option<String>,
    pub amount_eng: Option<f64>,
    pub bank: Option<String>,
    pub check_no: Option<String>,
    pub check_date: Option<String>,
    pub reference: Option<String>,
    pub application_details: Option<String>,
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl HumanitarianRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            financial_year: row.get("financial_year")?,
            name: row.get("name")?,
            father_name: row.get("father_name")?,
            mother_name: row.get("mother_name")?,
            nid_birth_reg_no: row.get("nid_birth_reg_no")?,
            profession: row.get("profession")?,
            relation_to_beneficiary: row.get("relation_to_beneficiary")?,
            address: row.get("address")?,
            upazila: row.get("upazila")?,
            zila: row.get("zila")?,
            mobile: row.get("mobile")?,
            category: row.get("category")?,
            amount_eng: row.get("amount_eng")?,
            bank: row.get("bank")?,
            check_no: row.get("check_no")?,
            check_date: row.get("check_date")?,
            reference: row.get("reference")?,
            application_details: row.get("application_details")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Aid record fields accepted on create and update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HumanitarianInput {
    #[serde(default)]
    pub financial_year: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub nid_birth_reg_no: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub relation_to_beneficiary: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub upazila: Option<String>,
    #[serde(default)]
    pub zila: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount_eng: Option<f64>,
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub check_no: Option<String>,
    #[serde(default)]
    pub check_date: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub application_details: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl HumanitarianInput {
    pub fn validate(&self) -> Result<(), RecordsError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(RecordsError::InvalidInput("name cannot be empty".into()));
        }
        validate_amount("amount_eng", self.amount_eng)
    }

    pub fn validate_new(&self) -> Result<(), RecordsError> {
        if self.name.is_none() {
            return Err(RecordsError::InvalidInput("name is required".into()));
        }
        self.validate()
    }

    fn assignments<'a>(&'a self, name: &'a Option<&'a str>) -> Vec<(&'static str, &'a dyn ToSql)> {
        let mut sets = vec![];
        assign(&mut sets, "financial_year", &self.financial_year);
        assign(&mut sets, "name", name);
        assign(&mut sets, "father_name", &self.father_name);
        assign(&mut sets, "mother_name", &self.mother_name);
        assign(&mut sets, "nid_birth_reg_no", &self.nid_birth_reg_no);
        assign(&mut sets, "profession", &self.profession);
        assign(&mut sets, "relation_to_beneficiary", &self.relation_to_beneficiary);
        assign(&mut sets, "address", &self.address);
        assign(&mut sets, "upazila", &self.upazila);
        assign(&mut sets, "zila", &self.zila);
        assign(&mut sets, "mobile", &self.mobile);
        assign(&mut sets, "category", &self.category);
        assign(&mut sets, "amount_eng", &self.amount_eng);
        assign(&mut sets, "bank", &self.bank);
        assign(&mut sets, "check_no", &self.check_no);
        assign(&mut sets, "check_date", &self.check_date);
        assign(&mut sets, "reference", &self.reference);
        assign(&mut sets, "application_details", &self.application_details);
        assign(&mut sets, "status", &self.status);
        sets
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HumanitarianStats {
    pub total_count: i64,
    pub total_amount: f64,
    #[serde(rename = "byCategory")]
    pub by_category: Vec<CategoryCount>,
    #[serde(rename = "byYear")]
    pub by_year: Vec<YearCount>,
}

pub fn get_aid(conn: &Connection, id: i64) -> Result<Option<HumanitarianRow>, RecordsError> {
    let sql = format!("SELECT {} FROM humanitarian_aid WHERE id = ?", HUMANITARIAN_COLUMNS);
    let rows = query::query_rows(conn, &sql, &[&id as &dyn ToSql], HumanitarianRow::from_row)?;
    Ok(rows.into_iter().next())
}

pub fn list_aid(conn: &Connection, query: &ListQuery) -> Result<Page<HumanitarianRow>, RecordsError> {
    query::list_page(conn, &HUMANITARIAN, query, HumanitarianRow::from_row)
}

pub fn search_aid(
    conn: &Connection,
    search_query: &str,
    year: Option<&str>,
) -> Result<Vec<HumanitarianRow>, RecordsError> {
    query::keyword_search(conn, &HUMANITARIAN, search_query, year, HumanitarianRow::from_row)
}

pub fn aid_years(conn: &Connection) -> Result<Vec<String>, RecordsError> {
    query::distinct_years(conn, &HUMANITARIAN)
}

/// Totals over `amount_eng` plus per-category and per-year counts
pub fn aid_stats(conn: &Connection) -> Result<HumanitarianStats, RecordsError> {
    let (total_count, total_amount): (i64, f64) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount_eng), 0) FROM humanitarian_aid",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| RecordsError::db("Stats query failed", e))?;

    Ok(HumanitarianStats {
        total_count,
        total_amount,
        by_category: query::category_counts(conn, &HUMANITARIAN)?,
        by_year: query::year_counts(conn, &HUMANITARIAN)?,
    })
}

pub fn create_aid(conn: &Connection, input: &HumanitarianInput) -> Result<i64, RecordsError> {
    input.validate_new()?;

    conn.execute(
        r#"
        INSERT INTO humanitarian_aid (
            financial_year, name, father_name, mother_name, nid_birth_reg_no, profession,
            relation_to_beneficiary, address, upazila, zila, mobile, category, amount_eng,
            bank, check_no, check_date, reference, application_details, status
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.financial_year,
            input.name.as_deref().map(str::trim),
            input.father_name,
            input.mother_name,
            input.nid_birth_reg_no,
            input.profession,
            input.relation_to_beneficiary,
            input.address,
            input.upazila,
            input.zila,
            input.mobile,
            input.category,
            input.amount_eng,
            input.bank,
            input.check_no,
            input.check_date,
            input.reference,
            input.application_details,
            input.status,
        ],
    )
    .map_err(|e| write_error("Insert failed", e))?;

    Ok(conn.last_insert_rowid())
}

pub fn update_aid(conn: &Connection, id: i64, input: &HumanitarianInput) -> Result<bool, RecordsError> {
    input.validate()?;
    let name = input.name.as_deref().map(str::trim);
    query::update_columns(conn, &HUMANITARIAN, id, &input.assignments(&name))
}

pub fn delete_aid(conn: &Connection, id: i64) -> Result<bool, RecordsError> {
    query::delete_row(conn, &HUMANITARIAN, id)
}
