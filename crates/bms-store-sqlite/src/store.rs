//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use bms_core::{
  family::{BeneficiaryBundle, Nomination, NominationOutcome, SplitPlan},
  record::{Record, value_text},
  store::{RecordStore, Rows},
  table::{self, DEFAULT_SCHEMA, TableRegistry, TableValidator},
};
use rusqlite::OptionalExtension as _;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  columns::{ColumnCache, Columns},
  encode::decode_row,
  error::{abort, is_unique_violation},
  family::{self, FamilyTables},
  query::{self, Statement, quote_ident},
  schema::{PRAGMAS, warehouse_ddl},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// How to open a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Name of the attached warehouse schema.
  pub schema:       String,
  /// File backing the warehouse schema; in-memory when `None`.
  pub schema_path:  Option<PathBuf>,
  /// Create the standard tables if they do not exist.
  pub bootstrap:    bool,
  pub busy_timeout: Duration,
  pub registry:     TableRegistry,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      schema:       DEFAULT_SCHEMA.to_owned(),
      schema_path:  None,
      bootstrap:    true,
      busy_timeout: Duration::from_secs(5),
      registry:     TableRegistry::standard(DEFAULT_SCHEMA),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A BMS record store backed by SQLite.
///
/// Cloning is cheap; the connection, validator and column cache are shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  validator: Arc<TableValidator>,
  columns:   Arc<ColumnCache>,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, attach the warehouse schema, and
  /// create the standard tables when requested.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store with the standard registry, as used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreOptions::default()).await
  }

  pub async fn open_in_memory_with(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let schema_ok = !options.schema.is_empty()
      && !options.schema.contains('.')
      && table::sanitize(&options.schema) == options.schema;
    if !schema_ok {
      return Err(bms_core::Error::InvalidTable(options.schema).into());
    }
    let StoreOptions { schema, schema_path, bootstrap, busy_timeout, registry } = options;
    let location = schema_path
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or_else(|| ":memory:".to_owned());

    conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(PRAGMAS)?;
        conn.execute(
          &format!("ATTACH DATABASE ?1 AS {}", quote_ident(&schema)),
          rusqlite::params![location],
        )?;
        if bootstrap {
          conn.execute_batch(&warehouse_ddl(&schema))?;
        }
        Ok(())
      })
      .await?;

    info!(tables = registry.physical_names().len(), "record store ready");
    Ok(Self {
      conn,
      validator: Arc::new(TableValidator::new(registry)),
      columns: Arc::new(ColumnCache::default()),
    })
  }

  /// Run raw SQL, e.g. to seed fixtures.
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn read(&self, table: &str, stmt: Statement) -> Result<Option<Rows>> {
    let rows = self.conn.call(move |conn| Ok(query_rows(conn, &stmt)?)).await;
    match rows {
      Ok(rows) if rows.is_empty() => Ok(None),
      Ok(rows) => Ok(Some(rows)),
      Err(e) => {
        error!(table, error = %e, "lookup failed");
        Ok(None)
      }
    }
  }

  /// Run `f` in one transaction against the beneficiary tables, committing
  /// only if it succeeds.
  async fn transact<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&rusqlite::Transaction<'_>, &FamilyTables) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    let tables = FamilyTables {
      beneficiary: self.validator.check(table::BENEFICIARY)?,
      contact:     self.validator.check(table::CONTACT)?,
      employment:  self.validator.check(table::EMPLOYMENT)?,
      columns:     Arc::clone(&self.columns),
    };
    Ok(
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          let out = f(&tx, &tables)?;
          tx.commit()?;
          Ok(out)
        })
        .await?,
    )
  }
}

fn query_rows(conn: &rusqlite::Connection, stmt: &Statement) -> rusqlite::Result<Rows> {
  tracing::debug!(sql = %stmt.sql, params = ?stmt.params, "query");
  let mut prepared = conn.prepare(&stmt.sql)?;
  let names: Vec<String> = prepared.column_names().into_iter().map(str::to_owned).collect();
  prepared
    .query_map(rusqlite::params_from_iter(stmt.params.iter()), |row| decode_row(row, &names))?
    .collect()
}

/// Check for a duplicate id and a complete record, then insert it.
fn insert_checked(
  conn: &rusqlite::Connection,
  table: &str,
  record: &Record,
  columns: &Columns,
) -> tokio_rusqlite::Result<usize> {
  let duplicate = || {
    abort(bms_core::Error::DuplicateId {
      table: table.to_owned(),
      id:    record.get("id").and_then(value_text).unwrap_or_default(),
    })
  };

  if let Some(id) = record.get("id").and_then(value_text) {
    if query::count_by_id(table, &id).count(conn)? > 0 {
      warn!(table, %id, "duplicate id");
      return Err(duplicate());
    }
  }

  if let Some(missing) = record.first_blank(columns.names.iter().map(String::as_str)) {
    warn!(table, column = missing, "record is missing a required attribute");
    return Err(abort(bms_core::Error::MissingAttribute(missing.to_owned())));
  }

  let Some(stmt) = query::insert(table, record) else {
    return Ok(0);
  };
  match stmt.execute(conn) {
    Ok(n) => Ok(n),
    Err(e) if is_unique_violation(&e) => Err(duplicate()),
    Err(e) => Err(e.into()),
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  fn validator(&self) -> &TableValidator { &self.validator }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn insert(&self, table: &str, record: Record) -> Result<bool> {
    let Ok(physical) = self.validator.check(table) else {
      return Ok(false);
    };
    let columns = Arc::clone(&self.columns);
    let target = physical.clone();

    let result: Result<usize> = self
      .conn
      .call(move |conn| {
        let cols = columns.get(conn, &target)?;
        insert_checked(conn, &target, &record, &cols)
      })
      .await
      .map_err(Error::from);

    match result {
      Ok(n) => {
        info!(table = %physical, rows = n, "record inserted");
        Ok(n > 0)
      }
      Err(Error::Core(e)) => Err(Error::Core(e)),
      Err(e) => {
        error!(table = %physical, error = %e, "insert failed");
        Ok(false)
      }
    }
  }

  async fn bulk_insert(&self, table: &str, records: Vec<Record>) -> Result<usize> {
    let physical = self.validator.check(table)?;
    let columns = Arc::clone(&self.columns);
    let target = physical.clone();
    let total = records.len();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let cols = columns.get(&tx, &target)?;
        let mut inserted = 0;
        for record in &records {
          inserted += insert_checked(&tx, &target, record, &cols)?;
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await
      .map_err(Error::from)
      .inspect_err(|e| error!(table = %physical, error = %e, "bulk insert rolled back"))?;

    info!(table = %physical, inserted, total, "bulk insert committed");
    Ok(inserted)
  }

  async fn update(&self, table: &str, id: &str, record: Record) -> Result<bool> {
    let Ok(physical) = self.validator.check(table) else {
      return Ok(false);
    };
    let id = id.trim().to_owned();
    if id.is_empty() {
      return Ok(false);
    }
    let target = physical.clone();
    let key = id.clone();

    let result = self
      .conn
      .call(move |conn| {
        if query::count_by_id(&target, &key).count(conn)? == 0 {
          return Ok(None);
        }
        match query::update(&target, &key, &record) {
          Some(stmt) => Ok(Some(stmt.execute(conn)?)),
          None => Ok(Some(0)),
        }
      })
      .await;

    match result {
      Ok(None) => {
        warn!(table = %physical, %id, "record to update not found");
        Ok(false)
      }
      Ok(Some(n)) => {
        info!(table = %physical, %id, rows = n, "record updated");
        Ok(n > 0)
      }
      Err(e) => {
        error!(table = %physical, %id, error = %e, "update failed");
        Ok(false)
      }
    }
  }

  async fn lookup_by_id(&self, table: &str, id: &str) -> Result<Option<Record>> {
    let Ok(physical) = self.validator.check(table) else {
      return Ok(None);
    };
    let stmt = query::select_by_id(&physical, id.trim());
    let row = self
      .conn
      .call(move |conn| {
        let mut prepared = conn.prepare(&stmt.sql)?;
        let names: Vec<String> =
          prepared.column_names().into_iter().map(str::to_owned).collect();
        Ok(
          prepared
            .query_row(rusqlite::params_from_iter(stmt.params.iter()), |row| {
              decode_row(row, &names)
            })
            .optional()?,
        )
      })
      .await;

    match row {
      Ok(row) => Ok(row),
      Err(e) => {
        error!(table = %physical, id, error = %e, "lookup failed");
        Ok(None)
      }
    }
  }

  async fn lookup_by_criteria(&self, table: &str, criteria: Record) -> Result<Option<Rows>> {
    let Ok(physical) = self.validator.check(table) else {
      return Ok(None);
    };
    let stmt = query::select(&physical, &criteria);
    self.read(&physical, stmt).await
  }

  async fn lookup_all(&self, table: &str) -> Result<Option<Rows>> {
    let Ok(physical) = self.validator.check(table) else {
      return Ok(None);
    };
    let stmt = query::select(&physical, &Record::new());
    self.read(&physical, stmt).await
  }

  async fn invalidate_columns(&self, table: Option<&str>) -> Result<()> {
    match table {
      Some(t) => {
        let physical = self.validator.resolve(t).unwrap_or_else(|| t.trim().to_owned());
        self.columns.invalidate(Some(&physical));
        info!(table = %physical, "column cache invalidated");
      }
      None => {
        self.columns.invalidate(None);
        info!("column cache cleared");
      }
    }
    Ok(())
  }

  // ── Families ──────────────────────────────────────────────────────────────

  async fn enroll_hof(&self, members: Vec<BeneficiaryBundle>) -> Result<usize> {
    let count = members.len();
    let enrolled = self
      .transact(move |tx, tables| family::enroll(tx, tables, members))
      .await
      .inspect_err(|e| warn!(members = count, error = %e, "HOF enrollment rolled back"))?;
    info!(members = enrolled, "HOF enrollment committed");
    Ok(enrolled)
  }

  async fn nominate(&self, nomination: Nomination) -> Result<NominationOutcome> {
    let outcome = self
      .transact(move |tx, tables| family::nominate(tx, tables, &nomination))
      .await
      .inspect_err(|e| warn!(error = %e, "nomination rolled back"))?;
    info!(
      deactivated = outcome.deactivated,
      moved = outcome.moved,
      promoted = outcome.promoted,
      "nomination committed"
    );
    Ok(outcome)
  }

  async fn split(&self, plan: SplitPlan) -> Result<usize> {
    let moved = self
      .transact(move |tx, tables| family::split(tx, tables, plan))
      .await
      .inspect_err(|e| warn!(error = %e, "split rolled back"))?;
    info!(beneficiaries = moved, "split committed");
    Ok(moved)
  }

  async fn insert_beneficiaries(&self, bundles: Vec<BeneficiaryBundle>) -> Result<usize> {
    let inserted = self
      .transact(move |tx, tables| family::insert_absent(tx, tables, bundles))
      .await
      .inspect_err(|e| warn!(error = %e, "beneficiary insert rolled back"))?;
    info!(rows = inserted, "beneficiary insert committed");
    Ok(inserted)
  }

  async fn update_beneficiaries(&self, bundles: Vec<BeneficiaryBundle>) -> Result<usize> {
    let updated = self
      .transact(move |tx, tables| family::update_existing(tx, tables, bundles))
      .await
      .inspect_err(|e| warn!(error = %e, "beneficiary update rolled back"))?;
    info!(rows = updated, "beneficiary update committed");
    Ok(updated)
  }
}
