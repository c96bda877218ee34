//! SQL statement assembly from records.
//!
//! Table names arrive already resolved and validated; column names come from
//! payload keys. Both are emitted as quoted identifiers. Every value is a
//! bound parameter.

use std::collections::BTreeSet;

use bms_core::record::Record;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::encode::encode_value;

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

impl Statement {
  fn new(sql: String, params: Vec<SqlValue>) -> Self { Self { sql, params } }

  pub fn execute(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    tracing::debug!(sql = %self.sql, params = ?self.params, "execute");
    conn.execute(&self.sql, rusqlite::params_from_iter(self.params.iter()))
  }

  /// Run a `SELECT COUNT(..)` statement.
  pub fn count(&self, conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    tracing::debug!(sql = %self.sql, params = ?self.params, "count");
    conn.query_row(
      &self.sql,
      rusqlite::params_from_iter(self.params.iter()),
      |row| row.get(0),
    )
  }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote each dot-separated part of a physical table name.
pub fn quote_table(physical: &str) -> String {
  physical.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

fn is_key(column: &str, keys: &[(&str, &str)]) -> bool {
  keys.iter().any(|(k, _)| k.eq_ignore_ascii_case(column))
}

fn keep(column: &str, value: &Value, columns: &BTreeSet<String>) -> bool {
  !value.is_array() && !value.is_object() && columns.contains(&column.to_lowercase())
}

fn where_keys(keys: &[(&str, &str)], params: &mut Vec<SqlValue>) -> String {
  keys
    .iter()
    .map(|(k, v)| {
      params.push(SqlValue::Text((*v).to_owned()));
      format!("{} = ?", quote_ident(k))
    })
    .collect::<Vec<_>>()
    .join(" AND ")
}

fn build_insert<'r>(
  table: &str,
  fields: impl Iterator<Item = (&'r String, &'r Value)>,
) -> Option<Statement> {
  let (names, params): (Vec<_>, Vec<_>) = fields
    .map(|(k, v)| (quote_ident(k), encode_value(v)))
    .unzip();
  if names.is_empty() {
    return None;
  }
  let placeholders = vec!["?"; names.len()].join(", ");
  Some(Statement::new(
    format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      quote_table(table),
      names.join(", ")
    ),
    params,
  ))
}

fn build_update<'r>(
  table: &str,
  keys: &[(&str, &str)],
  fields: impl Iterator<Item = (&'r String, &'r Value)>,
) -> Option<Statement> {
  let mut params = Vec::new();
  let assignments: Vec<_> = fields
    .filter(|(k, _)| !is_key(k, keys))
    .map(|(k, v)| {
      params.push(encode_value(v));
      format!("{} = ?", quote_ident(k))
    })
    .collect();
  if assignments.is_empty() {
    return None;
  }
  let predicate = where_keys(keys, &mut params);
  Some(Statement::new(
    format!(
      "UPDATE {} SET {} WHERE {predicate}",
      quote_table(table),
      assignments.join(", ")
    ),
    params,
  ))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert every field of the record, in order.
pub fn insert(table: &str, record: &Record) -> Option<Statement> {
  build_insert(table, record.iter())
}

/// Insert only scalar fields naming a known column (`columns` holds
/// lower-cased names). `None` if nothing remains.
pub fn insert_filtered(
  table: &str,
  record: &Record,
  columns: &BTreeSet<String>,
) -> Option<Statement> {
  build_insert(table, record.iter().filter(|(k, v)| keep(k, v, columns)))
}

/// Set every non-id field on the row with `id`. `None` if there is nothing
/// to set.
pub fn update(table: &str, id: &str, record: &Record) -> Option<Statement> {
  build_update(table, &[("id", id)], record.iter())
}

/// Set known, non-key scalar fields on the row matching every key.
pub fn update_filtered(
  table: &str,
  keys: &[(&str, &str)],
  record: &Record,
  columns: &BTreeSet<String>,
) -> Option<Statement> {
  build_update(table, keys, record.iter().filter(|(k, v)| keep(k, v, columns)))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// Equality on every criterion, AND-joined, ordered by id.
pub fn select(table: &str, criteria: &Record) -> Statement {
  let mut params = Vec::new();
  let predicates: Vec<_> = criteria
    .iter()
    .map(|(k, v)| {
      if v.is_null() {
        format!("{} IS NULL", quote_ident(k))
      } else {
        params.push(encode_value(v));
        format!("{} = ?", quote_ident(k))
      }
    })
    .collect();
  let mut sql = format!("SELECT * FROM {}", quote_table(table));
  if !predicates.is_empty() {
    sql.push_str(" WHERE ");
    sql.push_str(&predicates.join(" AND "));
  }
  sql.push_str(" ORDER BY \"id\"");
  Statement::new(sql, params)
}

pub fn select_by_id(table: &str, id: &str) -> Statement {
  Statement::new(
    format!("SELECT * FROM {} WHERE \"id\" = ?", quote_table(table)),
    vec![SqlValue::Text(id.to_owned())],
  )
}

pub fn count_by_id(table: &str, id: &str) -> Statement {
  count_by_keys(table, &[("id", id)])
}

pub fn count_by_keys(table: &str, keys: &[(&str, &str)]) -> Statement {
  let mut params = Vec::new();
  let predicate = where_keys(keys, &mut params);
  Statement::new(
    format!("SELECT COUNT(1) FROM {} WHERE {predicate}", quote_table(table)),
    params,
  )
}

/// A statement that returns no rows but exposes the table's columns.
pub fn probe(table: &str) -> String {
  format!("SELECT * FROM {} WHERE 1=0", quote_table(table))
}
