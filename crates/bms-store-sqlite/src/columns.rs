//! Memoised table column sets.
//!
//! Columns are discovered by preparing a statement that returns no rows and
//! reading its result columns. Entries stay cached until invalidated.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, Mutex, PoisonError},
};

use tracing::debug;

use crate::query::probe;

/// Column names of one table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
  pub names: Vec<String>,
  /// Lower-cased names for case-insensitive membership tests.
  pub lower: BTreeSet<String>,
}

impl Columns {
  fn new(names: Vec<String>) -> Self {
    let lower = names.iter().map(|n| n.to_lowercase()).collect();
    Self { names, lower }
  }
}

#[derive(Debug, Default)]
pub struct ColumnCache {
  tables: Mutex<HashMap<String, Arc<Columns>>>,
}

impl ColumnCache {
  /// Cached columns for `table`, probing the database on a miss.
  pub fn get(
    &self,
    conn: &rusqlite::Connection,
    table: &str,
  ) -> rusqlite::Result<Arc<Columns>> {
    if let Some(hit) = self.lock().get(table) {
      return Ok(Arc::clone(hit));
    }
    let columns = Arc::new(Columns::new(probe_columns(conn, table)?));
    debug!(table, columns = columns.names.len(), "cached table columns");
    self.lock().insert(table.to_owned(), Arc::clone(&columns));
    Ok(columns)
  }

  /// Forget one table, or every table when `table` is `None`.
  pub fn invalidate(&self, table: Option<&str>) {
    let mut tables = self.lock();
    match table {
      Some(t) => {
        tables.remove(t);
      }
      None => tables.clear(),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Columns>>> {
    self.tables.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Read the column names of `table` without fetching rows.
pub fn probe_columns(
  conn: &rusqlite::Connection,
  table: &str,
) -> rusqlite::Result<Vec<String>> {
  let stmt = conn.prepare(&probe(table))?;
  Ok(stmt.column_names().into_iter().map(str::to_owned).collect())
}
