//! The normalized statement document.
//!
//! The store imposes no internal schema on payloads: different companies may
//! report entirely different fields. It only requires a well-formed JSON
//! object of bounded depth and size.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ValidationError;

/// Deepest nesting accepted in a payload (the root object is level 1).
pub const MAX_PAYLOAD_DEPTH: usize = 64;

/// Largest accepted payload, measured as compact JSON.
pub const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// A validated payload document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Payload(Value);

impl Payload {
  pub fn new(value: Value) -> Result<Self, ValidationError> {
    if !value.is_object() {
      return Err(ValidationError::PayloadNotObject(json_type_name(&value)));
    }
    if depth(&value) > MAX_PAYLOAD_DEPTH {
      return Err(ValidationError::PayloadTooDeep(MAX_PAYLOAD_DEPTH));
    }
    let size = encoded_len(&value);
    if size > MAX_PAYLOAD_BYTES {
      return Err(ValidationError::PayloadTooLarge(size, MAX_PAYLOAD_BYTES));
    }
    Ok(Self(value))
  }

  /// Parse and validate a payload from JSON text.
  pub fn from_json_str(s: &str) -> crate::Result<Self> {
    let value: Value = serde_json::from_str(s)?;
    Ok(Self::new(value)?)
  }

  pub fn as_value(&self) -> &Value { &self.0 }

  /// Look up the value at a sequence of object keys.
  pub fn get_path<'a, I, S>(&self, segments: I) -> Option<&Value>
  where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + 'a + ?Sized,
  {
    let mut cur = &self.0;
    for seg in segments {
      cur = cur.as_object()?.get(seg.as_ref())?;
    }
    Some(cur)
  }

  /// Compact JSON text, as persisted.
  pub fn to_json_string(&self) -> String { self.0.to_string() }
}

impl TryFrom<Value> for Payload {
  type Error = ValidationError;

  fn try_from(value: Value) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Payload> for Value {
  fn from(p: Payload) -> Self { p.0 }
}

pub(crate) fn json_type_name(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Nesting depth, computed iteratively so hostile input cannot exhaust the
/// stack.
fn depth(root: &Value) -> usize {
  let mut max = 0;
  let mut stack = vec![(root, 1usize)];
  while let Some((v, d)) = stack.pop() {
    max = max.max(d);
    match v {
      Value::Array(items) => stack.extend(items.iter().map(|i| (i, d + 1))),
      Value::Object(map) => stack.extend(map.values().map(|i| (i, d + 1))),
      _ => {}
    }
  }
  max
}

fn encoded_len(v: &Value) -> usize {
  struct Counter(usize);
  impl std::io::Write for Counter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0 += buf.len();
      Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
  }
  let mut c = Counter(0);
  // Writing a `Value` into an infallible sink cannot fail.
  let _ = serde_json::to_writer(&mut c, v);
  c.0
}
