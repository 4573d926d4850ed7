//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, dates as `YYYY-MM-DD`, payloads
//! as compact JSON text.

use chrono::{DateTime, NaiveDate, Utc};
use finstat_core::{
  index::{IndexEntry, IndexValue, flatten},
  payload::Payload,
  statement::{FinancialStatement, StatementId},
};
use rusqlite::types::Value as SqlValue;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Index rows ──────────────────────────────────────────────────────────────

/// One `payload_index` row, ready to bind.
pub struct IndexRow {
  pub path: String,
  pub kind: &'static str,
  pub num:  Option<f64>,
  pub txt:  Option<String>,
}

impl From<&IndexEntry> for IndexRow {
  fn from(e: &IndexEntry) -> Self {
    let (num, txt) = scalar_columns(&e.value);
    Self { path: e.path.encoded(), kind: e.value.kind(), num, txt }
  }
}

/// The `num`/`txt` column values for an index value.
pub fn scalar_columns(v: &IndexValue) -> (Option<f64>, Option<String>) {
  match v {
    IndexValue::Key | IndexValue::Null => (None, None),
    IndexValue::Bool(b) => (Some(if *b { 1.0 } else { 0.0 }), None),
    IndexValue::Number(n) => (Some(*n), None),
    IndexValue::Text(s) => (None, Some(s.clone())),
  }
}

/// Bind parameter matching a row's value column, for equality lookups.
pub fn scalar_param(v: &IndexValue) -> Option<SqlValue> {
  match scalar_columns(v) {
    (Some(n), _) => Some(SqlValue::Real(n)),
    (_, Some(s)) => Some(SqlValue::Text(s)),
    (None, None) => None,
  }
}

pub fn index_rows(payload: &Payload) -> Vec<IndexRow> {
  flatten(payload).iter().map(IndexRow::from).collect()
}

// ─── Statement rows ──────────────────────────────────────────────────────────

/// Column list shared by every statement `SELECT` and `RETURNING` clause, in
/// the order [`RawStatement::from_row`] reads them.
pub const STATEMENT_COLUMNS: &str =
  "id, company, fiscal_year, period_end, currency, source_filename, payload, created_at";

/// Raw values read directly from a `financial_statements` row.
pub struct RawStatement {
  pub id:              i64,
  pub company:         String,
  pub fiscal_year:     i32,
  pub period_end:      Option<String>,
  pub currency:        Option<String>,
  pub source_filename: Option<String>,
  pub payload:         String,
  pub created_at:      String,
}

impl RawStatement {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      company:         row.get(1)?,
      fiscal_year:     row.get(2)?,
      period_end:      row.get(3)?,
      currency:        row.get(4)?,
      source_filename: row.get(5)?,
      payload:         row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_statement(self) -> Result<FinancialStatement> {
    let period_end = self.period_end.as_deref().map(decode_date).transpose()?;
    Ok(FinancialStatement {
      id: StatementId(self.id),
      company: self.company,
      fiscal_year: self.fiscal_year,
      period_end,
      currency: self.currency,
      source_filename: self.source_filename,
      payload: Payload::from_json_str(&self.payload)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
