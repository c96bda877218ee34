//! `l`: lookup by envelope id, by payload criteria, or of the whole table.

use bms_core::{
  Result,
  response::{Response, ResponseCode},
  store::RecordStore,
};
use tracing::info;

use super::{Call, store_err};

pub async fn handler<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let table = call.list_name().unwrap_or_default();

  let data = if let Some(id) = call.request.id() {
    let row = store.lookup_by_id(table, id).await.map_err(store_err)?;
    row.map(|r| serde_json::to_string(&r)).transpose()?
  } else {
    let criteria = call.fields()?;
    let rows = if criteria.is_empty() {
      store.lookup_all(table).await
    } else {
      store.lookup_by_criteria(table, criteria).await
    }
    .map_err(store_err)?;
    rows.map(|r| serde_json::to_string(&r)).transpose()?
  };

  info!(table, found = data.is_some(), "lookup completed");
  Ok(match data {
    Some(data) => Response::success("Lookup completed successfully").with_data(data),
    None => Response::new(ResponseCode::NotFound, "No records found"),
  })
}
