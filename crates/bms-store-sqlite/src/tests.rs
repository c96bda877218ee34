//! Integration tests for `SqliteStore` against an in-memory database.

use bms_core::{
  Error as CoreError,
  family::{BeneficiaryBundle, Nomination, SplitPlan},
  record::Record,
  store::RecordStore,
  table::TableRegistry,
};
use serde_json::{Value, json};

use crate::{Error, SqliteStore, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(v: Value) -> Record { Record::from_value(v).unwrap() }

fn core(err: Error) -> CoreError { err.into() }

// ─── Insert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_then_lookup_by_id() {
  let s = store().await;
  assert!(s.insert("Area", record(json!({ "id": "1", "name": "Cairo" }))).await.unwrap());

  let row = s.lookup_by_id("Area", "1").await.unwrap().unwrap();
  assert_eq!(row.get("name"), Some(&json!("Cairo")));
  assert_eq!(row.columns().collect::<Vec<_>>(), ["id", "name"]);
}

#[tokio::test]
async fn insert_without_every_column_is_missing_attribute() {
  let s = store().await;
  let err = s.insert("Area", record(json!({ "id": "1" }))).await.unwrap_err();
  assert!(matches!(core(err), CoreError::MissingAttribute(c) if c == "name"));

  let err = s
    .insert("Area", record(json!({ "id": "1", "NAME": "  " })))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::MissingAttribute(c) if c == "name"));
}

#[tokio::test]
async fn insert_duplicate_id() {
  let s = store().await;
  s.insert("City", record(json!({ "id": "7", "name": "Giza" }))).await.unwrap();
  let err = s
    .insert("City", record(json!({ "id": 7, "name": "Other" })))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::DuplicateId { id, .. } if id == "7"));
}

#[tokio::test]
async fn insert_into_invalid_table_is_false() {
  let s = store().await;
  let r = record(json!({ "id": "1", "name": "x" }));
  assert!(!s.insert("Nope", r.clone()).await.unwrap());
  // Resolves, but the keyword heuristic rejects the physical name.
  assert!(!s.insert("Gender", r).await.unwrap());
}

#[tokio::test]
async fn insert_storage_failure_is_false() {
  let s = store().await;
  let r = record(json!({ "id": "1", "name": "x", "bogus": 1 }));
  assert!(!s.insert("Area", r).await.unwrap());
  assert!(s.lookup_all("Area").await.unwrap().is_none());
}

// ─── Bulk insert ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_insert_is_all_or_nothing() {
  let s = store().await;
  let err = s
    .bulk_insert("Country", vec![
      record(json!({ "id": "1", "name": "Egypt" })),
      record(json!({ "id": "2" })),
    ])
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::MissingAttribute(c) if c == "name"));
  assert!(s.lookup_all("Country").await.unwrap().is_none());

  let n = s
    .bulk_insert("Country", vec![
      record(json!({ "id": "1", "name": "Egypt" })),
      record(json!({ "id": "2", "name": "Sudan" })),
    ])
    .await
    .unwrap();
  assert_eq!(n, 2);
}

#[tokio::test]
async fn bulk_insert_duplicate_within_batch_rolls_back() {
  let s = store().await;
  let err = s
    .bulk_insert("Language", vec![
      record(json!({ "id": "1", "name": "ar" })),
      record(json!({ "id": "1", "name": "en" })),
    ])
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::DuplicateId { .. }));
  assert!(s.lookup_all("Language").await.unwrap().is_none());
}

#[tokio::test]
async fn unique_constraint_after_id_check_is_duplicate() {
  let s = store().await;
  s.execute_batch(
    "CREATE UNIQUE INDEX GDEV1T_UHI_DATA.area_name_idx ON bms_Area_lkp(name);",
  )
  .await
  .unwrap();
  assert!(s.insert("Area", record(json!({ "id": "1", "name": "Cairo" }))).await.unwrap());

  // A fresh id passes the existence check; the index rejects the row.
  let err = s
    .insert("Area", record(json!({ "id": "2", "name": "Cairo" })))
    .await
    .unwrap_err();
  let err = core(err);
  assert!(matches!(&err, CoreError::DuplicateId { id, .. } if id == "2"));
  let response = bms_core::response::Response::from_error(&err);
  assert_eq!(response.response_code.as_u16(), 409);
  assert_eq!(response.response_message, "id is duplicate");

  let err = s
    .bulk_insert("Area", vec![
      record(json!({ "id": "3", "name": "Giza" })),
      record(json!({ "id": "4", "name": "Cairo" })),
    ])
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::DuplicateId { id, .. } if id == "4"));
  assert!(s.lookup_by_id("Area", "3").await.unwrap().is_none());
}

#[tokio::test]
async fn bulk_insert_invalid_table_is_an_error() {
  let s = store().await;
  let err = s.bulk_insert("Nope", vec![]).await.unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidTable(_)));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn partial_update_leaves_other_columns() {
  let s = store().await;
  s.execute_batch(
    "INSERT INTO GDEV1T_UHI_DATA.beneficiary (id, firstName, lastName) VALUES ('B1', 'A', 'B')",
  )
  .await
  .unwrap();

  assert!(s.update("beneficiary", "B1", record(json!({ "id": "X", "firstName": "Z" }))).await.unwrap());
  let row = s.lookup_by_id("beneficiary", "B1").await.unwrap().unwrap();
  assert_eq!(row.get("firstName"), Some(&json!("Z")));
  assert_eq!(row.get("lastName"), Some(&json!("B")));
}

#[tokio::test]
async fn update_reports_false_when_nothing_changes() {
  let s = store().await;
  s.insert("Area", record(json!({ "id": "1", "name": "x" }))).await.unwrap();

  assert!(!s.update("Area", "missing", record(json!({ "name": "y" }))).await.unwrap());
  assert!(!s.update("Area", "1", record(json!({ "id": "1" }))).await.unwrap());
  assert!(!s.update("Area", " ", record(json!({ "name": "y" }))).await.unwrap());
  assert!(!s.update("Nope", "1", record(json!({ "name": "y" }))).await.unwrap());
  assert!(!s.update("Area", "1", record(json!({ "bogus": "y" }))).await.unwrap());
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lookup_all_on_empty_table_is_none() {
  let s = store().await;
  assert!(s.lookup_all("Telecom").await.unwrap().is_none());
  assert!(s.lookup_all("Nope").await.unwrap().is_none());
  assert!(s.lookup_by_id("Telecom", "1").await.unwrap().is_none());
}

#[tokio::test]
async fn lookup_by_criteria_orders_by_id() {
  let s = store().await;
  for (id, name) in [("3", "b"), ("1", "b"), ("2", "a")] {
    s.insert("Cluster", record(json!({ "id": id, "name": name }))).await.unwrap();
  }

  let rows = s
    .lookup_by_criteria("Cluster", record(json!({ "name": "b" })))
    .await
    .unwrap()
    .unwrap();
  let ids: Vec<_> = rows.iter().filter_map(Record::id).collect();
  assert_eq!(ids, ["1", "3"]);

  let all = s.lookup_by_criteria("Cluster", Record::new()).await.unwrap().unwrap();
  assert_eq!(all.len(), 3);
  assert!(
    s.lookup_by_criteria("Cluster", record(json!({ "bogus": 1 })))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn blobs_are_returned_as_hex() {
  let registry = TableRegistry::standard("GDEV1T_UHI_DATA")
    .with_alias("Files", "GDEV1T_UHI_DATA.files")
    .unwrap();
  let s = SqliteStore::open_in_memory_with(StoreOptions { registry, ..Default::default() })
    .await
    .unwrap();
  s.execute_batch(
    "CREATE TABLE GDEV1T_UHI_DATA.files (id TEXT PRIMARY KEY, body BLOB);
     INSERT INTO GDEV1T_UHI_DATA.files VALUES ('f', x'CAFE');",
  )
  .await
  .unwrap();

  let row = s.lookup_by_id("Files", "f").await.unwrap().unwrap();
  assert_eq!(row.get("body"), Some(&json!("cafe")));
}

#[tokio::test]
async fn invalidated_columns_are_probed_again() {
  let s = store().await;
  s.insert("Area", record(json!({ "id": "1", "name": "x" }))).await.unwrap();
  s.execute_batch("ALTER TABLE GDEV1T_UHI_DATA.bms_Area_lkp ADD COLUMN code TEXT")
    .await
    .unwrap();

  assert!(s.insert("Area", record(json!({ "id": "2", "name": "y" }))).await.unwrap());

  s.invalidate_columns(Some("Area")).await.unwrap();
  let err = s
    .insert("Area", record(json!({ "id": "3", "name": "z" })))
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::MissingAttribute(c) if c == "code"));
}

// ─── HOF enrollment ──────────────────────────────────────────────────────────

fn member(id: &str) -> BeneficiaryBundle {
  BeneficiaryBundle::from_value(json!({
    "id": id, "firstName": "A", "lastName": "B", "fullName": "A B",
    "dob": "1990-01-01", "gender": "M", "mobile": "0100", "nationality": "EG",
    "nationalId": "290", "email": "a@b.c", "unknownField": "dropped",
    "contacts": [{ "id": format!("C-{id}"), "beneficiaryID": "WRONG", "address": "Cairo" }],
    "employments": [{
      "id": format!("E-{id}"), "netIncome": 1000.5, "jobDescription": "d", "job": "j",
      "employerGovernerate": "Cairo", "companySocialInsuranceId": "S1"
    }]
  }))
  .unwrap()
}

#[tokio::test]
async fn hof_enrollment_writes_members_and_children() {
  let s = store().await;
  assert_eq!(s.enroll_hof(vec![member("B1"), member("B2")]).await.unwrap(), 2);

  let contact = s.lookup_by_id("contact", "C-B1").await.unwrap().unwrap();
  assert_eq!(contact.get("beneficiaryId"), Some(&json!("B1")));
  let employment = s.lookup_by_id("employment", "E-B2").await.unwrap().unwrap();
  assert_eq!(employment.get("beneficiaryId"), Some(&json!("B2")));
  assert_eq!(employment.get("netIncome"), Some(&json!(1000.5)));

  // Enrolling again updates in place.
  let mut again = member("B1");
  again.beneficiary.insert("firstName", "Changed");
  s.enroll_hof(vec![again]).await.unwrap();
  let row = s.lookup_by_id("beneficiary", "B1").await.unwrap().unwrap();
  assert_eq!(row.get("firstName"), Some(&json!("Changed")));
}

#[tokio::test]
async fn hof_enrollment_is_all_or_nothing() {
  let s = store().await;
  let mut bad = member("B2");
  bad.employments[0].remove("job");

  let err = s.enroll_hof(vec![member("B1"), bad]).await.unwrap_err();
  assert!(matches!(core(err), CoreError::MissingAttribute(c) if c == "job"));
  assert!(s.lookup_all("beneficiary").await.unwrap().is_none());
  assert!(s.lookup_all("contact").await.unwrap().is_none());
}

// ─── Nomination ──────────────────────────────────────────────────────────────

async fn family_store() -> SqliteStore {
  let s = store().await;
  s.execute_batch(
    "INSERT INTO GDEV1T_UHI_DATA.beneficiary (id, familyId, familyRelation, activationStatus) VALUES
       ('H',  'F1', 'head of family', 'active'),
       ('D1', 'F1', 'Son',            'active'),
       ('D2', 'F1', NULL,             'active'),
       ('H2', 'F1', 'Wife',           'active'),
       ('X',  'F3', 'Head of Family', 'active');",
  )
  .await
  .unwrap();
  s
}

async fn field(s: &SqliteStore, id: &str, column: &str) -> Value {
  let row = s.lookup_by_id("beneficiary", id).await.unwrap().unwrap();
  row.get(column).cloned().unwrap_or(Value::Null)
}

#[tokio::test]
async fn nomination_replaces_head_and_moves_dependents() {
  let s = family_store().await;
  let outcome = s
    .nominate(Nomination::new("F1", "F2", "H2").unwrap())
    .await
    .unwrap();
  assert_eq!((outcome.deactivated, outcome.moved, outcome.promoted), (1, 2, 1));

  assert_eq!(field(&s, "H", "activationStatus").await, json!("inactive"));
  assert_eq!(field(&s, "H", "familyId").await, json!("F1"));
  assert_eq!(field(&s, "D1", "familyId").await, json!("F2"));
  // Without a relation the member is not a known dependent and stays put.
  assert_eq!(field(&s, "D2", "familyId").await, json!("F1"));
  assert_eq!(field(&s, "H2", "familyId").await, json!("F2"));
  assert_eq!(field(&s, "H2", "familyRelation").await, json!("Head of Family"));
  assert_eq!(field(&s, "X", "activationStatus").await, json!("active"));
}

#[tokio::test]
async fn nomination_rolls_back_when_new_head_is_missing() {
  let s = family_store().await;
  let err = s
    .nominate(Nomination::new("F1", "F2", "ghost").unwrap())
    .await
    .unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound(_)));

  assert_eq!(field(&s, "H", "activationStatus").await, json!("active"));
  assert_eq!(field(&s, "D1", "familyId").await, json!("F1"));
  assert_eq!(field(&s, "D2", "familyId").await, json!("F1"));
}

// ─── Split ───────────────────────────────────────────────────────────────────

fn split_plan(ids: &[&str]) -> SplitPlan {
  let members: Vec<Value> = ids
    .iter()
    .map(|id| json!({ "id": id, "employments": [{ "id": format!("E-{id}"), "job": "new" }] }))
    .collect();
  SplitPlan::from_payload(&json!({ "splitData": {
    "splitInfo": { "old_familyId": "F1", "new_familyId": "F9", "splitDate": "2024-05-01" },
    "beneficiaryData": members
  }}))
  .unwrap()
}

#[tokio::test]
async fn split_moves_members_and_upserts_children() {
  let s = family_store().await;
  assert_eq!(s.split(split_plan(&["D1", "D2"])).await.unwrap(), 2);

  assert_eq!(field(&s, "D1", "familyId").await, json!("F9"));
  assert!(field(&s, "D1", "updatedAt").await.is_string());
  let employment = s.lookup_by_id("employment", "E-D2").await.unwrap().unwrap();
  assert_eq!(employment.get("beneficiaryId"), Some(&json!("D2")));
  assert_eq!(employment.get("job"), Some(&json!("new")));
}

#[tokio::test]
async fn split_aborts_on_unknown_beneficiary() {
  let s = family_store().await;
  let err = s.split(split_plan(&["D1", "ghost"])).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound(m) if m.contains("ghost")));
  assert_eq!(field(&s, "D1", "familyId").await, json!("F1"));
  assert!(s.lookup_all("employment").await.unwrap().is_none());
}

// ─── Beneficiary insert / update ─────────────────────────────────────────────

#[tokio::test]
async fn insert_beneficiaries_skips_existing_rows() {
  let s = store().await;
  let bundle = BeneficiaryBundle::from_value(json!({
    "id": "B1", "firstName": "A",
    "contacts": [{ "id": "C1", "email": "x@y.z" }, { "email": "no id" }]
  }))
  .unwrap();

  assert_eq!(s.insert_beneficiaries(vec![bundle.clone()]).await.unwrap(), 2);
  assert_eq!(s.insert_beneficiaries(vec![bundle]).await.unwrap(), 0);

  let contact = s.lookup_by_id("contact", "C1").await.unwrap().unwrap();
  assert_eq!(contact.get("beneficiaryId"), Some(&json!("B1")));
}

#[tokio::test]
async fn insert_beneficiaries_tolerates_primary_key_conflicts() {
  let s = store().await;
  let first = BeneficiaryBundle::from_value(json!({
    "id": "B1", "contacts": [{ "id": "C1", "email": "b1@x.y" }]
  }))
  .unwrap();
  assert_eq!(s.insert_beneficiaries(vec![first]).await.unwrap(), 2);

  // (C1, B2) is absent, but C1 is already taken by B1's contact.
  let second = BeneficiaryBundle::from_value(json!({
    "id": "B2", "contacts": [{ "id": "C1", "email": "b2@x.y" }]
  }))
  .unwrap();
  assert_eq!(s.insert_beneficiaries(vec![second]).await.unwrap(), 1);

  assert!(s.lookup_by_id("beneficiary", "B2").await.unwrap().is_some());
  let contact = s.lookup_by_id("contact", "C1").await.unwrap().unwrap();
  assert_eq!(contact.get("beneficiaryId"), Some(&json!("B1")));
  assert_eq!(contact.get("email"), Some(&json!("b1@x.y")));
}

#[tokio::test]
async fn update_beneficiaries_requires_existing_rows() {
  let s = family_store().await;
  let ok = BeneficiaryBundle::from_value(json!({ "id": "D1", "email": "d1@x.y" })).unwrap();
  let missing = BeneficiaryBundle::from_value(json!({
    "id": "D2", "email": "d2@x.y",
    "contacts": [{ "id": "C-none", "address": "x" }]
  }))
  .unwrap();

  let err = s.update_beneficiaries(vec![ok.clone(), missing]).await.unwrap_err();
  assert!(matches!(core(err), CoreError::NotFound(_)));
  assert_eq!(field(&s, "D1", "email").await, Value::Null);

  assert_eq!(s.update_beneficiaries(vec![ok]).await.unwrap(), 1);
  assert_eq!(field(&s, "D1", "email").await, json!("d1@x.y"));
}
