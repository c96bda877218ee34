//! The `RecordStore` trait.
//!
//! Implemented by storage backends (e.g. `bms-store-sqlite`). The SOAP layer
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  family::{BeneficiaryBundle, Nomination, NominationOutcome, SplitPlan},
  record::Record,
  table::TableValidator,
};

/// Rows returned by a lookup, in `id` order.
pub type Rows = Vec<Record>;

/// Abstraction over a BMS record store.
///
/// Table arguments are aliases or allow-listed physical names; every method
/// resolves them through [`RecordStore::validator`] before touching storage.
///
/// Single-record operations report storage failures as `false` / `None` and
/// log them. Bulk and multi-step operations run in one transaction and
/// return the failure, leaving storage unchanged.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  fn validator(&self) -> &TableValidator;

  // ── Record operations ─────────────────────────────────────────────────

  /// Insert one record. `Ok(false)` for an invalid table or a storage
  /// failure; duplicate ids and incomplete records are errors.
  fn insert<'a>(
    &'a self,
    table: &'a str,
    record: Record,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert every record or none. Returns the number inserted.
  fn bulk_insert<'a>(
    &'a self,
    table: &'a str,
    records: Vec<Record>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Update the row with `id` from the record's non-id fields. `Ok(false)`
  /// when nothing was updated.
  fn update<'a>(
    &'a self,
    table: &'a str,
    id: &'a str,
    record: Record,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn lookup_by_id<'a>(
    &'a self,
    table: &'a str,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Rows matching every criterion by equality. Empty criteria match all.
  fn lookup_by_criteria<'a>(
    &'a self,
    table: &'a str,
    criteria: Record,
  ) -> impl Future<Output = Result<Option<Rows>, Self::Error>> + Send + 'a;

  fn lookup_all<'a>(
    &'a self,
    table: &'a str,
  ) -> impl Future<Output = Result<Option<Rows>, Self::Error>> + Send + 'a;

  /// Drop cached column sets for one table, or for all tables.
  fn invalidate_columns<'a>(
    &'a self,
    table: Option<&'a str>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Family operations ─────────────────────────────────────────────────

  /// Upsert each member with its contacts and employments. Returns the
  /// number of members enrolled.
  fn enroll_hof(
    &self,
    members: Vec<BeneficiaryBundle>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn nominate(
    &self,
    nomination: Nomination,
  ) -> impl Future<Output = Result<NominationOutcome, Self::Error>> + Send + '_;

  /// Move each listed beneficiary to the plan's new family. Returns the
  /// number of beneficiaries moved.
  fn split(
    &self,
    plan: SplitPlan,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Insert beneficiaries and children that do not exist yet. Returns the
  /// number of rows inserted.
  fn insert_beneficiaries(
    &self,
    bundles: Vec<BeneficiaryBundle>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Update beneficiaries and children by key. Returns the number of rows
  /// updated.
  fn update_beneficiaries(
    &self,
    bundles: Vec<BeneficiaryBundle>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
