//! `hof`: head-of-family enrollment.

use bms_core::{
  Error, Result,
  family::hof_members,
  response::{Response, ResponseCode},
  store::RecordStore,
};
use tracing::{info, warn};

use super::{Call, store_err};

pub async fn handler<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let members = hof_members(call.payload("HOF")?)?;
  let count = members.len();

  match store.enroll_hof(members).await.map_err(store_err) {
    Ok(enrolled) => {
      info!(members = count, enrolled, "HOF enrollment completed");
      Ok(Response::success("HOF enrollment completed successfully"))
    }
    Err(e @ Error::DuplicateId { .. }) => {
      warn!(error = %e, "duplicate id in HOF enrollment");
      Ok(Response::new(
        ResponseCode::Duplicate,
        format!("Duplicate ID in HOF enrollment: {e}"),
      ))
    }
    Err(e @ Error::MissingAttribute(_)) => {
      warn!(error = %e, "missing attributes in HOF enrollment");
      Ok(Response::new(
        ResponseCode::MissingAttribute,
        format!("Missing required attributes in HOF enrollment: {e}"),
      ))
    }
    Err(e) => Err(e),
  }
}
