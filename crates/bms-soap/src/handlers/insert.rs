//! `i`: bulk insert of `{listName, list:[record…]}`.

use bms_core::{
  Error, Result,
  record::Record,
  response::Response,
  store::RecordStore,
};
use serde_json::Value;
use tracing::info;

use super::{Call, LIST, store_err};

pub async fn handler<S: RecordStore>(store: &S, call: &Call<'_>) -> Result<Response> {
  let payload = call.payload("INSERT")?;
  let table = call
    .list_name()
    .ok_or_else(|| Error::InvalidPayload("Missing listName in jsonPayload".to_owned()))?;
  let items = payload
    .get(LIST)
    .and_then(Value::as_array)
    .filter(|items| !items.is_empty())
    .ok_or_else(|| Error::InvalidPayload("Missing or empty list array in jsonPayload".to_owned()))?;

  store.validator().check(table)?;
  let records = items
    .iter()
    .cloned()
    .map(Record::from_value)
    .collect::<Result<Vec<_>>>()?;

  let inserted = store.bulk_insert(table, records).await.map_err(store_err)?;
  info!(table, inserted, "bulk insert completed");
  Ok(Response::success("Bulk records inserted successfully"))
}
