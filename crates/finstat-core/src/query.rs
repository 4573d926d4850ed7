//! Structural predicates over payload content.
//!
//! Predicates are serialised with an `op` tag, e.g.
//!
//! ```json
//! { "op": "all", "of": [
//!   { "op": "gt", "path": "income_statement.revenue", "value": 1000000 },
//!   { "op": "contains", "value": { "currency": "USD" } }
//! ] }
//! ```
//!
//! [`PayloadPredicate::matches`] is the exact evaluator. Backends narrow the
//! candidate set with the structural index first and re-check candidates with
//! it, because containment over arrays cannot be decided from flattened rows
//! alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  ValidationError,
  index::{IndexValue, PayloadPath, flatten_value},
  payload::{Payload, json_type_name},
};

/// Deepest `all`/`any` nesting accepted.
pub const MAX_PREDICATE_DEPTH: usize = 16;

/// Most operands a single `all`/`any` may carry.
pub const MAX_PREDICATE_OPERANDS: usize = 256;

/// Most index lookups one predicate may expand to. Each leaf counts one, and
/// a `contains` counts one per flattened entry of its value.
pub const MAX_PREDICATE_TERMS: usize = 4096;

/// A numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
  Gt,
  Gte,
  Lt,
  Lte,
}

impl Comparison {
  pub fn apply(self, lhs: f64, rhs: f64) -> bool {
    match self {
      Self::Gt => lhs > rhs,
      Self::Gte => lhs >= rhs,
      Self::Lt => lhs < rhs,
      Self::Lte => lhs <= rhs,
    }
  }

  pub fn sql_operator(self) -> &'static str {
    match self {
      Self::Gt => ">",
      Self::Gte => ">=",
      Self::Lt => "<",
      Self::Lte => "<=",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PayloadPredicate {
  /// The path exists as an object member.
  Exists { path: PayloadPath },
  /// A scalar at the path equals `value`. Numbers compare numerically.
  Eq { path: PayloadPath, value: Value },
  Gt { path: PayloadPath, value: f64 },
  Gte { path: PayloadPath, value: f64 },
  Lt { path: PayloadPath, value: f64 },
  Lte { path: PayloadPath, value: f64 },
  /// The payload contains `value` as a sub-document; arrays behave as sets.
  Contains { value: Value },
  All { of: Vec<PayloadPredicate> },
  Any { of: Vec<PayloadPredicate> },
}

impl PayloadPredicate {
  pub fn exists(path: &str) -> Result<Self, ValidationError> {
    Ok(Self::Exists { path: path.parse()? })
  }

  pub fn eq(path: &str, value: impl Into<Value>) -> Result<Self, ValidationError> {
    Ok(Self::Eq { path: path.parse()?, value: value.into() })
  }

  pub fn compare(
    path: &str,
    cmp: Comparison,
    value: f64,
  ) -> Result<Self, ValidationError> {
    let path = path.parse()?;
    Ok(match cmp {
      Comparison::Gt => Self::Gt { path, value },
      Comparison::Gte => Self::Gte { path, value },
      Comparison::Lt => Self::Lt { path, value },
      Comparison::Lte => Self::Lte { path, value },
    })
  }

  /// Decompose the four range variants.
  pub fn as_comparison(&self) -> Option<(&PayloadPath, Comparison, f64)> {
    match self {
      Self::Gt { path, value } => Some((path, Comparison::Gt, *value)),
      Self::Gte { path, value } => Some((path, Comparison::Gte, *value)),
      Self::Lt { path, value } => Some((path, Comparison::Lt, *value)),
      Self::Lte { path, value } => Some((path, Comparison::Lte, *value)),
      _ => None,
    }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    self.validate_at(1)?;
    let terms = self.terms();
    if terms > MAX_PREDICATE_TERMS {
      return Err(ValidationError::InvalidPredicate(format!(
        "predicate expands to {terms} index lookups, limit is {MAX_PREDICATE_TERMS}"
      )));
    }
    Ok(())
  }

  /// Number of index lookups this predicate expands to.
  pub fn terms(&self) -> usize {
    match self {
      Self::Contains { value } => flatten_value(value).len(),
      Self::All { of } | Self::Any { of } => of.iter().map(Self::terms).sum(),
      _ => 1,
    }
  }

  fn validate_at(&self, depth: usize) -> Result<(), ValidationError> {
    if depth > MAX_PREDICATE_DEPTH {
      return Err(ValidationError::InvalidPredicate(format!(
        "nesting exceeds {MAX_PREDICATE_DEPTH} levels"
      )));
    }
    match self {
      Self::Exists { path } => non_empty(path),
      Self::Eq { path, value } => {
        non_empty(path)?;
        if IndexValue::from_scalar(value).is_none() {
          return Err(ValidationError::InvalidPredicate(format!(
            "eq needs a scalar value, found {}",
            json_type_name(value)
          )));
        }
        Ok(())
      }
      Self::Contains { value } => {
        if !value.is_object() {
          return Err(ValidationError::InvalidPredicate(format!(
            "contains needs an object, found {}",
            json_type_name(value)
          )));
        }
        Ok(())
      }
      Self::All { of } | Self::Any { of } => {
        if of.is_empty() {
          return Err(ValidationError::InvalidPredicate(
            "all/any need at least one operand".into(),
          ));
        }
        if of.len() > MAX_PREDICATE_OPERANDS {
          return Err(ValidationError::InvalidPredicate(format!(
            "all/any take at most {MAX_PREDICATE_OPERANDS} operands, found {}",
            of.len()
          )));
        }
        of.iter().try_for_each(|p| p.validate_at(depth + 1))
      }
      Self::Gt { path, value }
      | Self::Gte { path, value }
      | Self::Lt { path, value }
      | Self::Lte { path, value } => {
        non_empty(path)?;
        if !value.is_finite() {
          return Err(ValidationError::InvalidPredicate(format!(
            "comparison bound {value} is not finite"
          )));
        }
        Ok(())
      }
    }
  }

  /// Evaluate against a payload.
  pub fn matches(&self, payload: &Payload) -> bool {
    let root = payload.as_value();
    match self {
      Self::Exists { path } => !members_at(root, path).is_empty(),
      Self::Eq { path, value } => {
        let Some(want) = IndexValue::from_scalar(value) else {
          return false;
        };
        leaves_at(root, path)
          .into_iter()
          .any(|v| IndexValue::from_scalar(v).is_some_and(|got| got == want))
      }
      Self::Contains { value } => contains(root, value),
      Self::All { of } => of.iter().all(|p| p.matches(payload)),
      Self::Any { of } => of.iter().any(|p| p.matches(payload)),
      other => match other.as_comparison() {
        Some((path, cmp, bound)) => leaves_at(root, path)
          .into_iter()
          .filter_map(Value::as_f64)
          .any(|n| cmp.apply(n, bound)),
        None => false,
      },
    }
  }
}

fn non_empty(path: &PayloadPath) -> Result<(), ValidationError> {
  if path.is_empty() {
    Err(ValidationError::EmptyPath)
  } else {
    Ok(())
  }
}

// ─── Evaluation helpers ──────────────────────────────────────────────────────

/// Push `v`, or every non-array element reachable through nested arrays.
fn spread<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
  match v {
    Value::Array(items) => items.iter().for_each(|i| spread(i, out)),
    other => out.push(other),
  }
}

/// Every value stored as an object member at `path`, fanning out through
/// arrays the way the index does.
fn members_at<'a>(root: &'a Value, path: &PayloadPath) -> Vec<&'a Value> {
  let mut current = vec![root];
  for seg in path.segments() {
    let mut expanded = Vec::new();
    current.into_iter().for_each(|v| spread(v, &mut expanded));
    current = expanded
      .into_iter()
      .filter_map(|v| v.as_object().and_then(|m| m.get(seg)))
      .collect();
    if current.is_empty() {
      break;
    }
  }
  current
}

/// Non-array values at `path`; array members contribute their elements.
fn leaves_at<'a>(root: &'a Value, path: &PayloadPath) -> Vec<&'a Value> {
  let mut out = Vec::new();
  members_at(root, path)
    .into_iter()
    .for_each(|v| spread(v, &mut out));
  out
}

/// Document containment with set semantics for arrays.
fn contains(doc: &Value, pattern: &Value) -> bool {
  match (doc, pattern) {
    (Value::Object(d), Value::Object(p)) => p
      .iter()
      .all(|(k, pv)| d.get(k).is_some_and(|dv| contains(dv, pv))),
    (Value::Array(d), Value::Array(p)) => {
      p.iter().all(|pv| d.iter().any(|dv| contains(dv, pv)))
    }
    (Value::Array(d), pv) => d.iter().any(|dv| contains(dv, pv)),
    (d, p) => match (IndexValue::from_scalar(d), IndexValue::from_scalar(p)) {
      (Some(a), Some(b)) => a == b,
      _ => false,
    },
  }
}
