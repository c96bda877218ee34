//! `u`: bulk update of `{listName, list:[record…]}`, or a single update of
//! `{listName, …fields}` keyed by the envelope id.

use bms_core::{
  Result,
  record::Record,
  response::{Response, ResponseCode},
  store::RecordStore,
};
use serde_json::Value;
use tracing::{info, warn};

use super::{Call, LIST, store_err};

pub async fn handler<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let payload = call.payload("UPDATE")?;
  let table = call.list_name().unwrap_or_default();

  if let Some(items) = payload.get(LIST).and_then(Value::as_array) {
    return bulk(store, table, items).await;
  }

  let Some(id) = call.request.id() else {
    return Ok(Response::new(
      ResponseCode::BadRequest,
      "Missing ID for single update operation",
    ));
  };
  let updated = store.update(table, id, call.fields()?).await.map_err(store_err)?;
  info!(table, id, updated, "single update completed");
  Ok(if updated {
    Response::success("Record updated successfully")
  } else {
    Response::new(ResponseCode::NotFound, "Record not found or update failed")
  })
}

/// Items without an id, or that are not objects, count as failures.
async fn bulk<S: RecordStore>(store: &S, table: &str, items: &[Value]) -> Result<Response> {
  let total = items.len();
  let mut updated = 0;
  for item in items {
    let Ok(record) = Record::from_value(item.clone()) else {
      warn!(table, "bulk update item is not an object");
      continue;
    };
    let Some(id) = record.id() else {
      warn!(table, "missing id in bulk update item");
      continue;
    };
    if store.update(table, &id, record).await.map_err(store_err)? {
      updated += 1;
    }
  }
  info!(table, updated, total, "bulk update completed");

  Ok(if updated == total {
    Response::success("Bulk update completed successfully")
  } else if updated == 0 {
    Response::new(ResponseCode::NotFound, "No records updated. Check IDs and data.")
  } else {
    Response::new(
      ResponseCode::PartialSuccess,
      format!("Partial success: {updated}/{total} records updated."),
    )
  })
}
