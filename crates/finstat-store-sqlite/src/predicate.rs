//! Compiles a [`PayloadPredicate`] into SQL over `payload_index`.
//!
//! Each predicate becomes a sub-select yielding a set of `statement_id`s.
//! Conjunctions and disjunctions become `INTERSECT` and `UNION`. Containment
//! becomes grouped scans that keep statements matching every pattern entry. The
//! result is a candidate set: exact for key, scalar and range predicates, a
//! superset for containment, which the store re-checks in memory.
//!
//! Validation bounds `all`/`any` width well below SQLite's 500-term compound
//! limit, and containment entries are grouped so neither that limit nor the
//! expression depth limit is reached.

use finstat_core::{
  index::{IndexEntry, IndexValue, PayloadPath, flatten_value},
  query::PayloadPredicate,
};
use rusqlite::types::Value as SqlValue;

use crate::encode::scalar_param;

/// A SQL fragment selecting `statement_id` plus its positional parameters.
#[derive(Debug, Default)]
pub struct Fragment {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

const ALL_IDS: &str = "SELECT id AS statement_id FROM financial_statements";

/// Containment entries matched by one grouped scan.
const CONTAINS_CHUNK: usize = 128;

pub fn compile(predicate: &PayloadPredicate) -> Fragment {
  let mut f = Fragment::default();
  emit(predicate, &mut f);
  f
}

fn emit(predicate: &PayloadPredicate, f: &mut Fragment) {
  match predicate {
    PayloadPredicate::Exists { path } => {
      emit_entry(&IndexEntry { path: path.clone(), value: IndexValue::Key }, f);
    }
    PayloadPredicate::Eq { path, value } => match IndexValue::from_scalar(value) {
      Some(v) => emit_entry(&IndexEntry { path: path.clone(), value: v }, f),
      // Rejected by validation; an empty set keeps the SQL well-formed.
      None => f.sql.push_str("SELECT statement_id FROM payload_index WHERE 0"),
    },
    PayloadPredicate::Contains { value } => {
      let entries = flatten_value(value);
      if entries.is_empty() {
        f.sql.push_str(ALL_IDS);
      } else {
        compound(entries.chunks(CONTAINS_CHUNK), "INTERSECT", f, emit_all_entries);
      }
    }
    PayloadPredicate::All { of } => compound(of.iter(), "INTERSECT", f, emit),
    PayloadPredicate::Any { of } => compound(of.iter(), "UNION", f, emit),
    other => {
      if let Some((path, cmp, bound)) = other.as_comparison() {
        f.sql.push_str("SELECT statement_id FROM payload_index WHERE ");
        emit_path_kind(path, "num", f);
        f.sql.push_str(" AND num ");
        f.sql.push_str(cmp.sql_operator());
        f.sql.push_str(" ?");
        f.params.push(SqlValue::Real(bound));
      }
    }
  }
}

fn compound<'a, T: ?Sized + 'a>(
  items: impl Iterator<Item = &'a T>,
  operator: &str,
  f: &mut Fragment,
  mut each: impl FnMut(&'a T, &mut Fragment),
) {
  for (i, item) in items.enumerate() {
    if i > 0 {
      f.sql.push(' ');
      f.sql.push_str(operator);
      f.sql.push(' ');
    }
    f.sql.push_str("SELECT statement_id FROM (");
    each(item, f);
    f.sql.push(')');
  }
}

fn emit_path_kind(path: &PayloadPath, kind: &'static str, f: &mut Fragment) {
  f.sql.push_str("path = ? AND kind = ?");
  f.params.push(SqlValue::Text(path.encoded()));
  f.params.push(SqlValue::Text(kind.to_owned()));
}

/// Row condition for one entry, without the `SELECT`.
fn emit_condition(entry: &IndexEntry, f: &mut Fragment) {
  emit_path_kind(&entry.path, entry.value.kind(), f);
  match (&entry.value, scalar_param(&entry.value)) {
    (IndexValue::Text(_), Some(p)) => {
      f.sql.push_str(" AND txt = ?");
      f.params.push(p);
    }
    (_, Some(p)) => {
      f.sql.push_str(" AND num = ?");
      f.params.push(p);
    }
    (_, None) => {}
  }
}

fn emit_entry(entry: &IndexEntry, f: &mut Fragment) {
  f.sql.push_str("SELECT statement_id FROM payload_index WHERE ");
  emit_condition(entry, f);
}

/// Statements holding every one of `entries`.
///
/// Index rows of a statement are distinct, and so are flattened entries, so a
/// statement matches all of them exactly when it matches `entries.len()` rows.
fn emit_all_entries(entries: &[IndexEntry], f: &mut Fragment) {
  f.sql.push_str("SELECT statement_id FROM payload_index WHERE ");
  for (i, entry) in entries.iter().enumerate() {
    if i > 0 {
      f.sql.push_str(" OR ");
    }
    f.sql.push('(');
    emit_condition(entry, f);
    f.sql.push(')');
  }
  f.sql.push_str(" GROUP BY statement_id HAVING COUNT(*) = ?");
  f.params.push(SqlValue::Integer(entries.len() as i64));
}
