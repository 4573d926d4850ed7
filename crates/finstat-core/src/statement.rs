//! Financial statement records, the sole entity held by the store.
//!
//! A statement is identified twice: by a store-assigned [`StatementId`] and by
//! its natural key, the `(company, fiscal_year)` pair. Only the payload and its
//! provenance fields change after creation; `id` and `created_at` never do.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ValidationError, payload::Payload};

/// Inclusive range of accepted fiscal years.
pub const FISCAL_YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Longest accepted currency code.
pub const MAX_CURRENCY_LEN: usize = 16;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-assigned identifier. Strictly increasing and never reused.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StatementId(pub i64);

impl fmt::Display for StatementId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The natural key: at most one statement exists per pair.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StatementKey {
  pub company:     String,
  pub fiscal_year: i32,
}

impl StatementKey {
  pub fn new(company: impl Into<String>, fiscal_year: i32) -> Self {
    Self { company: company.into(), fiscal_year }
  }
}

impl fmt::Display for StatementKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.company, self.fiscal_year)
  }
}

// ─── Stored record ───────────────────────────────────────────────────────────

/// A persisted statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
  pub id:              StatementId,
  pub company:         String,
  pub fiscal_year:     i32,
  pub period_end:      Option<NaiveDate>,
  pub currency:        Option<String>,
  /// Provenance only; the store never interprets it.
  pub source_filename: Option<String>,
  pub payload:         Payload,
  /// Server-assigned timestamp; never changes after creation.
  pub created_at:      DateTime<Utc>,
}

impl FinancialStatement {
  pub fn key(&self) -> StatementKey {
    StatementKey::new(self.company.clone(), self.fiscal_year)
  }
}

// ─── NewStatement ────────────────────────────────────────────────────────────

/// Input to [`crate::store::StatementStore::put`] and
/// [`crate::store::StatementStore::insert`].
/// `id` and `created_at` are always set by the store; they are not accepted
/// from callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStatement {
  pub company:         String,
  pub fiscal_year:     i32,
  #[serde(default)]
  pub period_end:      Option<NaiveDate>,
  #[serde(default)]
  pub currency:        Option<String>,
  #[serde(default)]
  pub source_filename: Option<String>,
  pub payload:         Payload,
}

impl NewStatement {
  /// Convenience constructor with all optional fields unset.
  pub fn new(company: impl Into<String>, fiscal_year: i32, payload: Payload) -> Self {
    Self {
      company: company.into(),
      fiscal_year,
      period_end: None,
      currency: None,
      source_filename: None,
      payload,
    }
  }

  pub fn key(&self) -> StatementKey {
    StatementKey::new(self.company.clone(), self.fiscal_year)
  }

  /// Check the scalar columns and normalise the company name.
  ///
  /// The payload has already been validated when the [`Payload`] was built.
  pub fn validate(mut self) -> Result<Self, ValidationError> {
    let trimmed = self.company.trim();
    if trimmed.is_empty() {
      return Err(ValidationError::EmptyCompany);
    }
    if trimmed.len() != self.company.len() {
      self.company = trimmed.to_owned();
    }

    if !FISCAL_YEAR_RANGE.contains(&self.fiscal_year) {
      return Err(ValidationError::FiscalYearOutOfRange(self.fiscal_year));
    }

    if let Some(code) = &self.currency
      && (code.is_empty()
        || code.chars().count() > MAX_CURRENCY_LEN
        || code.chars().any(char::is_whitespace))
    {
      return Err(ValidationError::InvalidCurrency(code.clone()));
    }

    if self.source_filename.as_deref().is_some_and(|s| s.trim().is_empty()) {
      return Err(ValidationError::EmptySourceFilename);
    }

    Ok(self)
  }
}

// ─── PutOutcome ──────────────────────────────────────────────────────────────

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutOutcome {
  pub statement: FinancialStatement,
  /// `true` if the key was new; `false` if an existing record was replaced.
  pub created:   bool,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn payload() -> Payload { Payload::new(json!({ "revenue": 1 })).unwrap() }

  #[test]
  fn validate_trims_company() {
    let s = NewStatement::new("  Acme Ltd ", 2023, payload())
      .validate()
      .unwrap();
    assert_eq!(s.company, "Acme Ltd");
  }

  #[test]
  fn validate_rejects_blank_company() {
    let err = NewStatement::new("   ", 2023, payload()).validate().unwrap_err();
    assert_eq!(err, ValidationError::EmptyCompany);
  }

  #[test]
  fn validate_rejects_out_of_range_year() {
    let err = NewStatement::new("Acme", 0, payload()).validate().unwrap_err();
    assert_eq!(err, ValidationError::FiscalYearOutOfRange(0));

    let err = NewStatement::new("Acme", 10_000, payload())
      .validate()
      .unwrap_err();
    assert_eq!(err, ValidationError::FiscalYearOutOfRange(10_000));
  }

  #[test]
  fn validate_currency_codes() {
    let mut s = NewStatement::new("Acme", 2023, payload());
    s.currency = Some("AUTO".into());
    assert!(s.clone().validate().is_ok());

    s.currency = Some("US D".into());
    assert!(matches!(
      s.clone().validate(),
      Err(ValidationError::InvalidCurrency(_))
    ));

    s.currency = Some(String::new());
    assert!(matches!(
      s.validate(),
      Err(ValidationError::InvalidCurrency(_))
    ));
  }

  #[test]
  fn validate_rejects_blank_source_filename() {
    let mut s = NewStatement::new("Acme", 2023, payload());
    s.source_filename = Some(" ".into());
    assert_eq!(s.validate().unwrap_err(), ValidationError::EmptySourceFilename);
  }

  #[test]
  fn new_statement_deserialises_with_defaults() {
    let s: NewStatement = serde_json::from_value(json!({
      "company": "Acme",
      "fiscal_year": 2023,
      "payload": { "revenue": 1000000, "currency": "USD" }
    }))
    .unwrap();
    assert_eq!(s.period_end, None);
    assert_eq!(s.payload.as_value()["revenue"], json!(1000000));
  }
}
