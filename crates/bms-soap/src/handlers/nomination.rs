//! `nomination`: replace a family's head.

use bms_core::{
  Result,
  family::Nomination,
  response::Response,
  store::RecordStore,
};
use tracing::info;

use super::{Call, store_err};

pub async fn handler<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let nomination = Nomination::from_payload(call.payload("NOMINATION")?)?;
  let outcome = store.nominate(nomination).await.map_err(store_err)?;
  info!(
    deactivated = outcome.deactivated,
    moved = outcome.moved,
    promoted = outcome.promoted,
    "nomination completed"
  );
  Ok(Response::success("Nomination completed successfully"))
}
