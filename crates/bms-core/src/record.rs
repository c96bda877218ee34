//! An ordered column → value mapping built from a JSON object.
//!
//! Column lookup is case-insensitive: an exact match wins, otherwise the
//! first key equal ignoring ASCII case is used. Nested arrays and objects may
//! be present in the source JSON (they carry child records) but are never
//! written to a row; see [`Record::scalars`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// An ordered mapping from column name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
  pub fn new() -> Self { Self(Map::new()) }

  /// Build a record from a JSON value, which must be an object.
  pub fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Object(map) => Ok(Self(map)),
      other => Err(Error::InvalidPayload(format!(
        "expected a JSON object, found {}",
        kind_of(&other)
      ))),
    }
  }

  /// Parse a record from JSON text.
  pub fn parse(json: &str) -> Result<Self> {
    Self::from_value(serde_json::from_str(json)?)
  }

  fn key_of(&self, column: &str) -> Option<&String> {
    if let Some((k, _)) = self.0.get_key_value(column) {
      return Some(k);
    }
    self.0.keys().find(|k| k.eq_ignore_ascii_case(column))
  }

  pub fn get(&self, column: &str) -> Option<&Value> {
    self.key_of(column).and_then(|k| self.0.get(k))
  }

  pub fn contains(&self, column: &str) -> bool { self.key_of(column).is_some() }

  pub fn insert(
    &mut self,
    column: impl Into<String>,
    value: impl Into<Value>,
  ) -> Option<Value> {
    self.0.insert(column.into(), value.into())
  }

  /// Remove every key equal to `column` ignoring case, preserving the order
  /// of the remaining keys. Returns the first removed value.
  pub fn remove(&mut self, column: &str) -> Option<Value> {
    let removed = self.get(column).cloned();
    self.0.retain(|k, _| !k.eq_ignore_ascii_case(column));
    removed
  }

  /// The `id` column rendered as text, if present, non-null and non-blank.
  pub fn id(&self) -> Option<String> {
    self
      .get("id")
      .and_then(value_text)
      .filter(|s| !s.trim().is_empty())
  }

  /// `true` when the column is absent, null, or a blank string.
  pub fn is_blank(&self, column: &str) -> bool {
    match self.get(column) {
      None | Some(Value::Null) => true,
      Some(Value::String(s)) => s.trim().is_empty(),
      Some(_) => false,
    }
  }

  /// The first of `columns` that [`is_blank`](Self::is_blank) in this record.
  pub fn first_blank<'a, I>(&self, columns: I) -> Option<&'a str>
  where
    I: IntoIterator<Item = &'a str>,
  {
    columns.into_iter().find(|c| self.is_blank(c))
  }

  pub fn columns(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> { self.0.iter() }

  /// Fields whose value can be stored in a single column.
  pub fn scalars(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter().filter(|(_, v)| !v.is_array() && !v.is_object())
  }

  /// Child records held in the array at `key`. Absent or non-array values
  /// yield no children.
  pub fn children(&self, key: &str) -> Result<Vec<Record>> {
    match self.0.get(key) {
      Some(Value::Array(items)) => {
        items.iter().cloned().map(Record::from_value).collect()
      }
      _ => Ok(Vec::new()),
    }
  }

  /// A copy of this record without the given keys (matched exactly).
  pub fn without(&self, keys: &[&str]) -> Record {
    Record(
      self
        .0
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn into_value(self) -> Value { Value::Object(self.0) }
}

impl From<Map<String, Value>> for Record {
  fn from(map: Map<String, Value>) -> Self { Self(map) }
}

impl FromIterator<(String, Value)> for Record {
  fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// Render a scalar the way it is compared against text columns: strings as
/// themselves, numbers and booleans via their JSON text. Null and containers
/// have no text form.
pub fn value_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
