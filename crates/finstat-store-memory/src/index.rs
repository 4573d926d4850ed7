//! Inverted structural index: `(path, value)` → statement ids.

use std::{
  cmp::Ordering,
  collections::{BTreeMap, BTreeSet, HashMap},
  ops::Bound,
};

use finstat_core::{
  index::{IndexEntry, IndexValue, PayloadPath, flatten_value},
  query::{Comparison, PayloadPredicate},
  statement::StatementId,
};

type Ids = BTreeSet<StatementId>;

/// Totally ordered wrapper for index numbers; `-0.0` folds into `0.0`.
#[derive(Debug, Clone, Copy)]
struct NumKey(f64);

impl NumKey {
  fn new(n: f64) -> Self { Self(if n == 0.0 { 0.0 } else { n }) }
}

impl PartialEq for NumKey {
  fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for NumKey {}

impl PartialOrd for NumKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for NumKey {
  fn cmp(&self, other: &Self) -> Ordering { self.0.total_cmp(&other.0) }
}

#[derive(Debug, Default)]
pub struct PayloadIndex {
  /// Key existence and scalar equality.
  exact:   HashMap<IndexEntry, Ids>,
  /// Numeric leaves per path, ordered for range scans.
  numbers: HashMap<PayloadPath, BTreeMap<NumKey, Ids>>,
}

impl PayloadIndex {
  pub fn insert(&mut self, id: StatementId, entries: &[IndexEntry]) {
    for entry in entries {
      self.exact.entry(entry.clone()).or_default().insert(id);
      if let IndexValue::Number(n) = entry.value {
        self
          .numbers
          .entry(entry.path.clone())
          .or_default()
          .entry(NumKey::new(n))
          .or_default()
          .insert(id);
      }
    }
  }

  pub fn remove(&mut self, id: StatementId, entries: &[IndexEntry]) {
    for entry in entries {
      if let Some(ids) = self.exact.get_mut(entry) {
        ids.remove(&id);
        if ids.is_empty() {
          self.exact.remove(entry);
        }
      }
      if let IndexValue::Number(n) = entry.value
        && let Some(by_value) = self.numbers.get_mut(&entry.path)
      {
        let k = NumKey::new(n);
        if let Some(ids) = by_value.get_mut(&k) {
          ids.remove(&id);
          if ids.is_empty() {
            by_value.remove(&k);
          }
        }
        if by_value.is_empty() {
          self.numbers.remove(&entry.path);
        }
      }
    }
  }

  fn lookup(&self, entry: &IndexEntry) -> Ids {
    self.exact.get(entry).cloned().unwrap_or_default()
  }

  fn range(&self, path: &PayloadPath, cmp: Comparison, bound: f64) -> Ids {
    let Some(by_value) = self.numbers.get(path) else {
      return Ids::new();
    };
    let b = NumKey::new(bound);
    let bounds = match cmp {
      Comparison::Gt => (Bound::Excluded(b), Bound::Unbounded),
      Comparison::Gte => (Bound::Included(b), Bound::Unbounded),
      Comparison::Lt => (Bound::Unbounded, Bound::Excluded(b)),
      Comparison::Lte => (Bound::Unbounded, Bound::Included(b)),
    };
    by_value
      .range(bounds)
      .flat_map(|(_, ids)| ids.iter().copied())
      .collect()
  }

  /// Ids that may satisfy `predicate`. Exact except for containment, where
  /// the result is a superset to be re-checked against the payload.
  ///
  /// `all` yields the full id set, for predicates that constrain nothing.
  pub fn candidates(&self, predicate: &PayloadPredicate, all: &impl Fn() -> Ids) -> Ids {
    match predicate {
      PayloadPredicate::Exists { path } => {
        self.lookup(&IndexEntry { path: path.clone(), value: IndexValue::Key })
      }
      PayloadPredicate::Eq { path, value } => match IndexValue::from_scalar(value) {
        Some(v) => self.lookup(&IndexEntry { path: path.clone(), value: v }),
        None => Ids::new(),
      },
      PayloadPredicate::Contains { value } => {
        let mut entries = flatten_value(value).into_iter();
        let Some(first) = entries.next() else {
          return all();
        };
        entries.fold(self.lookup(&first), |acc, e| {
          if acc.is_empty() {
            acc
          } else {
            intersect(acc, &self.lookup(&e))
          }
        })
      }
      PayloadPredicate::All { of } => {
        let mut parts = of.iter().map(|p| self.candidates(p, all));
        let first = parts.next().unwrap_or_default();
        parts.fold(first, |acc, ids| intersect(acc, &ids))
      }
      PayloadPredicate::Any { of } => {
        of.iter().flat_map(|p| self.candidates(p, all)).collect()
      }
      other => match other.as_comparison() {
        Some((path, cmp, bound)) => self.range(path, cmp, bound),
        None => Ids::new(),
      },
    }
  }
}

fn intersect(mut acc: Ids, other: &Ids) -> Ids {
  acc.retain(|id| other.contains(id));
  acc
}

#[cfg(test)]
mod tests {
  use finstat_core::{index::flatten, payload::Payload};
  use serde_json::json;

  use super::*;

  fn entries(v: serde_json::Value) -> Vec<IndexEntry> {
    flatten(&Payload::new(v).unwrap())
  }

  fn ids(raw: &[i64]) -> Ids { raw.iter().map(|&i| StatementId(i)).collect() }

  #[test]
  fn range_scan_uses_numeric_order() {
    let mut idx = PayloadIndex::default();
    idx.insert(StatementId(1), &entries(json!({ "r": -10 })));
    idx.insert(StatementId(2), &entries(json!({ "r": 0 })));
    idx.insert(StatementId(3), &entries(json!({ "r": 2.5 })));

    let path: PayloadPath = "r".parse().unwrap();
    assert_eq!(idx.range(&path, Comparison::Gt, 0.0), ids(&[3]));
    assert_eq!(idx.range(&path, Comparison::Gte, -0.0), ids(&[2, 3]));
    assert_eq!(idx.range(&path, Comparison::Lt, 0.0), ids(&[1]));
    assert_eq!(idx.range(&path, Comparison::Lte, 100.0), ids(&[1, 2, 3]));
  }

  #[test]
  fn remove_drops_every_entry() {
    let mut idx = PayloadIndex::default();
    let e = entries(json!({ "a": { "b": 1 }, "c": "x" }));
    idx.insert(StatementId(7), &e);
    idx.remove(StatementId(7), &e);
    assert!(idx.exact.is_empty());
    assert!(idx.numbers.is_empty());
  }

  #[test]
  fn combinators_intersect_and_union() {
    let mut idx = PayloadIndex::default();
    idx.insert(StatementId(1), &entries(json!({ "a": 1, "b": 1 })));
    idx.insert(StatementId(2), &entries(json!({ "a": 1 })));
    idx.insert(StatementId(3), &entries(json!({ "c": 1 })));
    let all = || ids(&[1, 2, 3]);

    let both = PayloadPredicate::All {
      of: vec![
        PayloadPredicate::exists("a").unwrap(),
        PayloadPredicate::exists("b").unwrap(),
      ],
    };
    assert_eq!(idx.candidates(&both, &all), ids(&[1]));

    let either = PayloadPredicate::Any {
      of: vec![
        PayloadPredicate::exists("b").unwrap(),
        PayloadPredicate::exists("c").unwrap(),
      ],
    };
    assert_eq!(idx.candidates(&either, &all), ids(&[1, 3]));

    let everything = PayloadPredicate::Contains { value: json!({}) };
    assert_eq!(idx.candidates(&everything, &all), all());
  }
}
