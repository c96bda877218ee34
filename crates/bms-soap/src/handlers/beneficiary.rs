//! `INSERT_BENEFICIARY`, `UPDATE_BENEFICIARY` and `SPLIT_BENEFICIARY`.

use bms_core::{
  Result,
  family::{SplitPlan, enrollment_beneficiaries, update_beneficiaries},
  response::Response,
  store::RecordStore,
};
use tracing::info;

use super::{Call, store_err};

pub async fn insert<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let bundles = enrollment_beneficiaries(call.payload("INSERT_BENEFICIARY")?)?;
  let inserted = store.insert_beneficiaries(bundles).await.map_err(store_err)?;
  info!(inserted, "beneficiary insert completed");
  Ok(Response::success("Beneficiary data inserted successfully"))
}

pub async fn update<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let bundles = update_beneficiaries(call.payload("UPDATE_BENEFICIARY")?)?;
  let updated = store.update_beneficiaries(bundles).await.map_err(store_err)?;
  info!(updated, "beneficiary update completed");
  Ok(Response::success("Beneficiary data updated successfully"))
}

pub async fn split<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let plan = SplitPlan::from_payload(call.payload("SPLIT_BENEFICIARY")?)?;
  let new_family_id = plan.new_family_id.clone();
  let moved = store.split(plan).await.map_err(store_err)?;
  info!(%new_family_id, moved, "beneficiary split completed");
  Ok(Response::success("Beneficiary split completed successfully"))
}
