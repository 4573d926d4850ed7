//! Structural index model.
//!
//! A payload is flattened into [`IndexEntry`] rows: one `Key` entry for every
//! object member (so existence queries on interior nodes work) and one scalar
//! entry for every leaf value. Array elements are indexed under the array's
//! own path, which gives arrays set semantics: `{"tags": ["a", "b"]}` yields
//! `tags = "a"` and `tags = "b"`.
//!
//! Backends store these rows next to the record and rewrite them in the same
//! atomic unit as the record itself.

use std::{
  collections::HashSet,
  fmt,
  hash::{Hash, Hasher},
  str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{ValidationError, payload::Payload};

/// Separator used when a path is encoded into a single storage column.
/// The ASCII unit separator never appears in ordinary JSON keys.
pub const PATH_SEPARATOR: char = '\u{1f}';

// ─── PayloadPath ─────────────────────────────────────────────────────────────

/// A sequence of object keys from the payload root.
///
/// Written in dotted form (`income_statement.revenue`) in predicates and query
/// strings. Keys that themselves contain dots can be addressed by supplying
/// the path as a JSON array of segments instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PayloadPath(Vec<String>);

impl PayloadPath {
  pub fn segments(&self) -> &[String] { &self.0 }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Single-column storage form.
  pub fn encoded(&self) -> String {
    let mut out = String::new();
    for (i, seg) in self.0.iter().enumerate() {
      if i > 0 {
        out.push(PATH_SEPARATOR);
      }
      out.push_str(seg);
    }
    out
  }
}

impl fmt::Display for PayloadPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.join("."))
  }
}

impl FromStr for PayloadPath {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.strip_prefix("payload.").unwrap_or(s);
    if s.is_empty() {
      return Err(ValidationError::EmptyPath);
    }
    let segments: Vec<String> = s.split('.').map(str::to_owned).collect();
    if segments.iter().any(String::is_empty) {
      return Err(ValidationError::InvalidPredicate(format!(
        "path {s:?} has an empty segment"
      )));
    }
    Ok(Self(segments))
  }
}

impl Serialize for PayloadPath {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    if self.0.iter().any(|s| s.contains('.')) {
      self.0.serialize(serializer)
    } else {
      serializer.collect_str(self)
    }
  }
}

impl<'de> Deserialize<'de> for PayloadPath {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
      Dotted(String),
      Segments(Vec<String>),
    }

    match Repr::deserialize(deserializer)? {
      Repr::Dotted(s) => s.parse().map_err(serde::de::Error::custom),
      Repr::Segments(segs) => Ok(Self(segs)),
    }
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// What an index row records about a path.
#[derive(Debug, Clone)]
pub enum IndexValue {
  /// The path exists as an object member.
  Key,
  Null,
  Bool(bool),
  Number(f64),
  Text(String),
}

impl IndexValue {
  /// Scalar index value for a JSON leaf; `None` for arrays and objects.
  pub fn from_scalar(v: &Value) -> Option<Self> {
    match v {
      Value::Null => Some(Self::Null),
      Value::Bool(b) => Some(Self::Bool(*b)),
      Value::Number(n) => n.as_f64().map(Self::Number),
      Value::String(s) => Some(Self::Text(s.clone())),
      Value::Array(_) | Value::Object(_) => None,
    }
  }

  /// Discriminant stored in the `kind` column of SQL backends.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Key => "key",
      Self::Null => "null",
      Self::Bool(_) => "bool",
      Self::Number(_) => "num",
      Self::Text(_) => "str",
    }
  }

  /// `-0.0` and `0.0` index identically.
  fn number_bits(n: f64) -> u64 { if n == 0.0 { 0 } else { n.to_bits() } }
}

impl PartialEq for IndexValue {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Key, Self::Key) | (Self::Null, Self::Null) => true,
      (Self::Bool(a), Self::Bool(b)) => a == b,
      (Self::Number(a), Self::Number(b)) => {
        Self::number_bits(*a) == Self::number_bits(*b)
      }
      (Self::Text(a), Self::Text(b)) => a == b,
      _ => false,
    }
  }
}

impl Eq for IndexValue {}

impl Hash for IndexValue {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind().hash(state);
    match self {
      Self::Key | Self::Null => {}
      Self::Bool(b) => b.hash(state),
      Self::Number(n) => Self::number_bits(*n).hash(state),
      Self::Text(s) => s.hash(state),
    }
  }
}

/// One row of the structural index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
  pub path:  PayloadPath,
  pub value: IndexValue,
}

// ─── Flattening ──────────────────────────────────────────────────────────────

/// Flatten a payload into deduplicated index entries, in traversal order.
pub fn flatten(payload: &Payload) -> Vec<IndexEntry> {
  flatten_value(payload.as_value())
}

/// Flatten an arbitrary JSON value. Used for payloads and for the pattern
/// documents of containment predicates, which must produce matching rows.
pub fn flatten_value(root: &Value) -> Vec<IndexEntry> {
  let mut out = Vec::new();
  let mut seen = HashSet::new();
  let mut path = Vec::new();
  walk(&mut path, root, &mut out, &mut seen);
  out
}

fn walk(
  path: &mut Vec<String>,
  v: &Value,
  out: &mut Vec<IndexEntry>,
  seen: &mut HashSet<IndexEntry>,
) {
  match v {
    Value::Object(map) => {
      for (key, child) in map {
        path.push(key.clone());
        push(out, seen, path, IndexValue::Key);
        walk(path, child, out, seen);
        path.pop();
      }
    }
    Value::Array(items) => {
      for item in items {
        walk(path, item, out, seen);
      }
    }
    scalar => {
      if path.is_empty() {
        return;
      }
      if let Some(value) = IndexValue::from_scalar(scalar) {
        push(out, seen, path, value);
      }
    }
  }
}

fn push(
  out: &mut Vec<IndexEntry>,
  seen: &mut HashSet<IndexEntry>,
  path: &[String],
  value: IndexValue,
) {
  let entry = IndexEntry { path: PayloadPath(path.to_vec()), value };
  if seen.insert(entry.clone()) {
    out.push(entry);
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn path(s: &str) -> PayloadPath { s.parse().unwrap() }

  #[test]
  fn parses_dotted_paths() {
    assert_eq!(
      path("income_statement.revenue").segments(),
      &["income_statement", "revenue"]
    );
    assert_eq!(path("payload.revenue"), path("revenue"));
    assert!("".parse::<PayloadPath>().is_err());
    assert!("a..b".parse::<PayloadPath>().is_err());
  }

  #[test]
  fn path_serde_accepts_segments_with_dots() {
    let p: PayloadPath = serde_json::from_value(json!(["note 1.2", "x"])).unwrap();
    assert_eq!(p.segments(), &["note 1.2", "x"]);
    assert_eq!(serde_json::to_value(&p).unwrap(), json!(["note 1.2", "x"]));

    let p: PayloadPath = serde_json::from_value(json!("a.b")).unwrap();
    assert_eq!(serde_json::to_value(&p).unwrap(), json!("a.b"));
  }

  #[test]
  fn flatten_emits_keys_and_leaves() {
    let p = Payload::new(json!({
      "balance_sheet": { "assets": { "total_assets": 500 } },
      "currency": "USD",
      "restated": false,
      "auditor": null,
    }))
    .unwrap();

    let entries = flatten(&p);
    let has = |p: &str, v: IndexValue| {
      entries.contains(&IndexEntry { path: path(p), value: v })
    };

    assert!(has("balance_sheet", IndexValue::Key));
    assert!(has("balance_sheet.assets", IndexValue::Key));
    assert!(has("balance_sheet.assets.total_assets", IndexValue::Key));
    assert!(has("balance_sheet.assets.total_assets", IndexValue::Number(500.0)));
    assert!(has("currency", IndexValue::Text("USD".into())));
    assert!(has("restated", IndexValue::Bool(false)));
    assert!(has("auditor", IndexValue::Null));
    assert_eq!(entries.len(), 10);
  }

  #[test]
  fn arrays_index_elements_under_parent_path() {
    let p = Payload::new(json!({
      "segments": [ { "name": "retail" }, { "name": "retail" }, { "name": "cloud" } ],
      "tags": [1, 1.0, 2],
    }))
    .unwrap();

    let entries = flatten(&p);
    let names: Vec<_> = entries
      .iter()
      .filter(|e| e.path == path("segments.name"))
      .map(|e| e.value.clone())
      .collect();
    assert_eq!(names, vec![
      IndexValue::Key,
      IndexValue::Text("retail".into()),
      IndexValue::Text("cloud".into()),
    ]);

    let tags = entries.iter().filter(|e| e.path == path("tags")).count();
    // Key + 1 + 2; `1` and `1.0` collapse.
    assert_eq!(tags, 3);
  }

  #[test]
  fn negative_zero_matches_zero() {
    assert_eq!(IndexValue::Number(-0.0), IndexValue::Number(0.0));
  }

  #[test]
  fn encoded_path_uses_unit_separator() {
    assert_eq!(path("a.b").encoded(), "a\u{1f}b");
  }
}
