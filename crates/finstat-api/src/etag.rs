//! ETag computation and `If-Match` evaluation for statement resources.
//!
//! ETags are SHA-256 hashes over the record id and a canonical JSON rendering
//! of the replaceable fields. Object keys are written in sorted order, so the
//! tag depends only on content.

use axum::http::{HeaderMap, header};
use finstat_core::statement::FinancialStatement;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

/// Compute the strong ETag for `statement`, including surrounding quotes.
pub fn compute_etag(statement: &FinancialStatement) -> String {
  let mutable = json!({
    "period_end":      statement.period_end,
    "currency":        statement.currency,
    "source_filename": statement.source_filename,
    "payload":         statement.payload.as_value(),
  });

  let mut canonical = String::new();
  write_canonical(&mut canonical, &mutable);

  let mut hasher = Sha256::new();
  hasher.update(statement.id.0.to_le_bytes());
  hasher.update(canonical.as_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

fn write_canonical(out: &mut String, value: &Value) {
  match value {
    Value::Object(map) => {
      let mut members: Vec<_> = map.iter().collect();
      members.sort_unstable_by(|a, b| a.0.cmp(b.0));
      out.push('{');
      for (i, (k, v)) in members.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(k.clone()).to_string());
        out.push(':');
        write_canonical(out, v);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, v) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(out, v);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

/// The raw `If-Match` header, if the request carries one.
pub fn if_match(headers: &HeaderMap) -> Option<&str> {
  headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok())
}

/// Evaluate an `If-Match` header value against the current record.
///
/// `*` matches any existing record. Otherwise the header is a comma-separated
/// list of tags; weak tags never match.
pub fn precondition_holds(if_match: &str, current: Option<&FinancialStatement>) -> bool {
  let Some(current) = current else { return false };
  if if_match.trim() == "*" {
    return true;
  }
  let etag = compute_etag(current);
  if_match
    .split(',')
    .map(str::trim)
    .filter(|tag| !tag.starts_with("W/"))
    .any(|tag| strip_etag_quotes(tag) == strip_etag_quotes(&etag))
}

/// `If-Match` values may arrive with or without the surrounding `"`.
fn strip_etag_quotes(s: &str) -> &str { s.trim_matches('"') }

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use finstat_core::{payload::Payload, statement::StatementId};

  use super::*;

  fn make_statement(id: i64, payload: Value) -> FinancialStatement {
    FinancialStatement {
      id:              StatementId(id),
      company:         "Acme".into(),
      fiscal_year:     2023,
      period_end:      None,
      currency:        Some("USD".into()),
      source_filename: None,
      payload:         Payload::new(payload).unwrap(),
      created_at:      Utc.timestamp_opt(0, 0).unwrap(),
    }
  }

  #[test]
  fn key_order_does_not_matter() {
    let a = make_statement(1, json!({ "a": 1, "b": { "x": true, "y": null } }));
    let b = make_statement(1, json!({ "b": { "y": null, "x": true }, "a": 1 }));
    assert_eq!(compute_etag(&a), compute_etag(&b));
  }

  #[test]
  fn payload_and_id_change_the_tag() {
    let base = make_statement(1, json!({ "revenue": 1 }));
    let edited = make_statement(1, json!({ "revenue": 2 }));
    let other_id = make_statement(2, json!({ "revenue": 1 }));
    assert_ne!(compute_etag(&base), compute_etag(&edited));
    assert_ne!(compute_etag(&base), compute_etag(&other_id));
  }

  #[test]
  fn created_at_is_not_part_of_the_tag() {
    let a = make_statement(1, json!({}));
    let mut b = a.clone();
    b.created_at = Utc.timestamp_opt(86_400, 0).unwrap();
    assert_eq!(compute_etag(&a), compute_etag(&b));
  }

  #[test]
  fn if_match_forms() {
    let s = make_statement(1, json!({}));
    let tag = compute_etag(&s);
    let bare = tag.trim_matches('"').to_owned();

    assert!(precondition_holds("*", Some(&s)));
    assert!(precondition_holds(&tag, Some(&s)));
    assert!(precondition_holds(&bare, Some(&s)));
    assert!(precondition_holds(&format!("\"nope\", {tag}"), Some(&s)));
    assert!(!precondition_holds(&format!("W/{tag}"), Some(&s)));
    assert!(!precondition_holds("\"nope\"", Some(&s)));
    assert!(!precondition_holds("*", None));
  }
}
