//! Multi-step beneficiary writes.
//!
//! Every function here runs inside a transaction opened by the caller and
//! returns on the first failure, so the caller's rollback discards all prior
//! writes of the operation.

use std::sync::Arc;

use bms_core::{
  Error as CoreError,
  family::{
    BENEFICIARY_ID, BeneficiaryBundle, HEAD_OF_FAMILY, INACTIVE, Nomination,
    NominationOutcome, SplitPlan,
  },
  record::{Record, value_text},
};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
  columns::ColumnCache,
  error::{abort, is_unique_violation},
  query::{self, quote_table},
};

/// Resolved physical names of the beneficiary tables.
pub struct FamilyTables {
  pub beneficiary: String,
  pub contact:     String,
  pub employment:  String,
  pub columns:     Arc<ColumnCache>,
}

type StepResult<T> = tokio_rusqlite::Result<T>;

fn duplicate(table: &str, id: &str) -> tokio_rusqlite::Error {
  abort(CoreError::DuplicateId { table: table.to_owned(), id: id.to_owned() })
}

/// Insert the known columns of `record`, translating key violations.
fn insert_known(
  conn: &Connection,
  tables: &FamilyTables,
  table: &str,
  record: &Record,
) -> StepResult<usize> {
  let columns = tables.columns.get(conn, table)?;
  let Some(stmt) = query::insert_filtered(table, record, &columns.lower) else {
    debug!(table, "no known columns to insert");
    return Ok(0);
  };
  match stmt.execute(conn) {
    Ok(n) => Ok(n),
    Err(e) if is_unique_violation(&e) => {
      Err(duplicate(table, &record.id().unwrap_or_default()))
    }
    Err(e) => Err(e.into()),
  }
}

/// Update the known, non-key columns of the row matching `keys`.
fn update_known(
  conn: &Connection,
  tables: &FamilyTables,
  table: &str,
  keys: &[(&str, &str)],
  record: &Record,
) -> StepResult<usize> {
  let columns = tables.columns.get(conn, table)?;
  match query::update_filtered(table, keys, record, &columns.lower) {
    Some(stmt) => Ok(stmt.execute(conn)?),
    None => Ok(0),
  }
}

fn exists(conn: &Connection, table: &str, keys: &[(&str, &str)]) -> StepResult<bool> {
  Ok(query::count_by_keys(table, keys).count(conn)? > 0)
}

/// Update by id when the row exists, insert otherwise. Records without an id
/// are inserted.
fn upsert(
  conn: &Connection,
  tables: &FamilyTables,
  table: &str,
  record: &Record,
) -> StepResult<usize> {
  match record.id() {
    Some(id) if exists(conn, table, &[("id", id.as_str())])? => {
      update_known(conn, tables, table, &[("id", id.as_str())], record)
    }
    _ => insert_known(conn, tables, table, record),
  }
}

/// The child's own `beneficiaryId`, or the parent's id.
fn child_parent(child: &Record, parent: &str) -> String {
  child
    .get(BENEFICIARY_ID)
    .and_then(value_text)
    .filter(|s| !s.trim().is_empty())
    .unwrap_or_else(|| parent.to_owned())
}

// ─── HOF enrollment ──────────────────────────────────────────────────────────

pub fn enroll(
  conn: &Connection,
  tables: &FamilyTables,
  members: Vec<BeneficiaryBundle>,
) -> StepResult<usize> {
  let mut enrolled = 0;
  for mut member in members {
    let id = member.prepare_enrollment().map_err(abort)?;
    upsert(conn, tables, &tables.beneficiary, &member.beneficiary)?;
    for contact in &member.contacts {
      upsert(conn, tables, &tables.contact, contact)?;
    }
    for employment in &member.employments {
      upsert(conn, tables, &tables.employment, employment)?;
    }
    debug!(
      %id,
      contacts = member.contacts.len(),
      employments = member.employments.len(),
      "member enrolled"
    );
    enrolled += 1;
  }
  Ok(enrolled)
}

// ─── Nomination ──────────────────────────────────────────────────────────────

pub fn nominate(
  conn: &Connection,
  tables: &FamilyTables,
  nomination: &Nomination,
) -> StepResult<NominationOutcome> {
  let table = quote_table(&tables.beneficiary);
  let Nomination { old_family_id, new_family_id, new_head_id } = nomination;

  let deactivated = conn.execute(
    &format!(
      "UPDATE {table} SET \"activationStatus\" = ?1
       WHERE \"familyId\" = ?2 AND LOWER(\"familyRelation\") = LOWER(?3)"
    ),
    rusqlite::params![INACTIVE, old_family_id, HEAD_OF_FAMILY],
  )?;
  info!(%old_family_id, rows = deactivated, "old head of family deactivated");

  let moved = conn.execute(
    &format!(
      "UPDATE {table} SET \"familyId\" = ?1
       WHERE \"familyId\" = ?2 AND LOWER(\"familyRelation\") <> LOWER(?3)"
    ),
    rusqlite::params![new_family_id, old_family_id, HEAD_OF_FAMILY],
  )?;
  info!(%old_family_id, %new_family_id, rows = moved, "dependents moved");

  if !exists(conn, &tables.beneficiary, &[("id", new_head_id.as_str())])? {
    warn!(%new_head_id, "nominated head of family not found");
    return Err(abort(CoreError::NotFound(format!(
      "Beneficiary not found: {new_head_id}"
    ))));
  }
  let promoted = conn.execute(
    &format!("UPDATE {table} SET \"familyRelation\" = ?1 WHERE \"id\" = ?2"),
    rusqlite::params![HEAD_OF_FAMILY, new_head_id],
  )?;
  info!(%new_head_id, rows = promoted, "new head of family promoted");

  Ok(NominationOutcome { deactivated, moved, promoted })
}

// ─── Split ───────────────────────────────────────────────────────────────────

pub fn split(conn: &Connection, tables: &FamilyTables, plan: SplitPlan) -> StepResult<usize> {
  let table = quote_table(&tables.beneficiary);
  let mut moved = 0;

  for mut member in plan.members {
    let id = member
      .id()
      .ok_or_else(|| abort(CoreError::MissingField("id in beneficiaryData".to_owned())))?;
    if !exists(conn, &tables.beneficiary, &[("id", id.as_str())])? {
      warn!(%id, "beneficiary to split not found");
      return Err(abort(CoreError::NotFound(format!("Beneficiary not found: {id}"))));
    }

    conn.execute(
      &format!(
        "UPDATE {table} SET \"familyId\" = ?1, \"updatedAt\" = CURRENT_TIMESTAMP WHERE \"id\" = ?2"
      ),
      rusqlite::params![plan.new_family_id, id],
    )?;
    moved += 1;

    member.default_child_parent(&id);
    for employment in member.employments.iter().filter(|e| e.id().is_some()) {
      upsert(conn, tables, &tables.employment, employment)?;
    }
    for contact in member.contacts.iter().filter(|c| c.id().is_some()) {
      upsert(conn, tables, &tables.contact, contact)?;
    }
    debug!(%id, new_family_id = %plan.new_family_id, "beneficiary split");
  }

  Ok(moved)
}

// ─── Beneficiary insert / update ─────────────────────────────────────────────

/// Insert a row that is not there yet; a key violation means another writer
/// got there first and is not an error.
fn insert_if_absent(
  conn: &Connection,
  tables: &FamilyTables,
  table: &str,
  keys: &[(&str, &str)],
  record: &Record,
) -> StepResult<usize> {
  if exists(conn, table, keys)? {
    return Ok(0);
  }
  match insert_known(conn, tables, table, record) {
    Err(tokio_rusqlite::Error::Other(e))
      if matches!(e.downcast_ref::<CoreError>(), Some(CoreError::DuplicateId { .. })) =>
    {
      warn!(table, "duplicate key ignored");
      Ok(0)
    }
    other => other,
  }
}

pub fn insert_absent(
  conn: &Connection,
  tables: &FamilyTables,
  bundles: Vec<BeneficiaryBundle>,
) -> StepResult<usize> {
  let mut inserted = 0;
  for bundle in bundles {
    let parent = bundle.id();
    if let Some(id) = &parent {
      let keys = [("id", id.as_str())];
      inserted +=
        insert_if_absent(conn, tables, &tables.beneficiary, &keys, &bundle.beneficiary)?;
    }
    let children = bundle
      .employments
      .iter()
      .map(|e| (&tables.employment, e))
      .chain(bundle.contacts.iter().map(|c| (&tables.contact, c)));
    for (table, child) in children {
      let Some(id) = child.id() else { continue };
      let owner = child_parent(child, parent.as_deref().unwrap_or_default());
      let mut row = child.clone();
      if row.is_blank(BENEFICIARY_ID) {
        row.remove(BENEFICIARY_ID);
        row.insert(BENEFICIARY_ID, owner.clone());
      }
      let keys = [("id", id.as_str()), (BENEFICIARY_ID, owner.as_str())];
      inserted += insert_if_absent(conn, tables, table, &keys, &row)?;
    }
  }
  Ok(inserted)
}

fn update_or_missing(
  conn: &Connection,
  tables: &FamilyTables,
  table: &str,
  keys: &[(&str, &str)],
  record: &Record,
) -> StepResult<usize> {
  if !exists(conn, table, keys)? {
    let key = keys.iter().map(|(_, v)| *v).collect::<Vec<_>>().join(",");
    warn!(table, %key, "row to update not found");
    return Err(abort(CoreError::NotFound(format!("Beneficiary not found: {key}"))));
  }
  update_known(conn, tables, table, keys, record)
}

pub fn update_existing(
  conn: &Connection,
  tables: &FamilyTables,
  bundles: Vec<BeneficiaryBundle>,
) -> StepResult<usize> {
  let mut updated = 0;
  for bundle in bundles {
    let id = bundle
      .id()
      .ok_or_else(|| abort(CoreError::MissingField("id in beneficiaryData".to_owned())))?;
    let keys = [("id", id.as_str())];
    updated +=
      update_or_missing(conn, tables, &tables.beneficiary, &keys, &bundle.beneficiary)?;

    let children = bundle
      .employments
      .iter()
      .map(|e| (&tables.employment, e))
      .chain(bundle.contacts.iter().map(|c| (&tables.contact, c)));
    for (table, child) in children {
      let child_id = child
        .id()
        .ok_or_else(|| abort(CoreError::MissingField(format!("id in {table}"))))?;
      let owner = child_parent(child, &id);
      let keys = [("id", child_id.as_str()), (BENEFICIARY_ID, owner.as_str())];
      updated += update_or_missing(conn, tables, table, &keys, child)?;
    }
  }
  Ok(updated)
}
