//! Conversion between JSON values and SQLite values.
//!
//! Scalars bind as their natural SQLite type. BLOB columns are returned as
//! lowercase hex text; timestamps are stored and returned as text.

use bms_core::record::Record;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

// ─── JSON → SQLite ───────────────────────────────────────────────────────────

/// Encode a JSON scalar for binding. Containers bind as their JSON text.
pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::String(s) => SqlValue::Text(s.clone()),
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => n.as_f64().map_or_else(|| SqlValue::Text(n.to_string()), SqlValue::Real),
    },
    Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
  }
}

// ─── SQLite → JSON ───────────────────────────────────────────────────────────

pub fn decode_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::from(i),
    ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => Value::String(hex::encode(b)),
  }
}

/// Read a full row into a record, in column order.
pub fn decode_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
  columns
    .iter()
    .enumerate()
    .map(|(i, name)| Ok((name.clone(), decode_value(row.get_ref(i)?))))
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn scalars_encode_to_natural_types() {
    assert_eq!(encode_value(&json!(null)), SqlValue::Null);
    assert_eq!(encode_value(&json!("x")), SqlValue::Text("x".into()));
    assert_eq!(encode_value(&json!(true)), SqlValue::Integer(1));
    assert_eq!(encode_value(&json!(false)), SqlValue::Integer(0));
    assert_eq!(encode_value(&json!(42)), SqlValue::Integer(42));
    assert_eq!(encode_value(&json!(2.5)), SqlValue::Real(2.5));
  }

  #[test]
  fn blobs_decode_as_hex() {
    assert_eq!(decode_value(ValueRef::Blob(&[0xde, 0xad])), json!("dead"));
    assert_eq!(decode_value(ValueRef::Real(f64::NAN)), Value::Null);
  }
}
