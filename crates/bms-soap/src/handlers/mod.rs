//! One handler per indicator.
//!
//! Handlers receive a validated request and its parsed payload, call the
//! store, and build the response. Domain errors are returned and mapped to
//! response codes by the dispatcher.

pub mod beneficiary;
pub mod hof;
pub mod insert;
pub mod lookup;
pub mod nomination;
pub mod update;

use bms_core::{Error, Result, envelope::Request, record::Record};
use serde_json::Value;

/// Payload key naming the target table.
pub const LIST_NAME: &str = "listName";
/// Payload key holding the records of a bulk operation.
pub const LIST: &str = "list";

/// Lift a store error into the domain error.
pub fn store_err<E: Into<Error>>(e: E) -> Error { e.into() }

/// A validated request on its way to a handler.
pub struct Call<'r> {
  pub request: &'r Request,
  pub payload: Option<Value>,
}

impl<'r> Call<'r> {
  pub fn new(request: &'r Request, payload: Option<Value>) -> Self {
    Self { request, payload }
  }

  /// The payload, which the indicator requires.
  pub fn payload(&self, operation: &str) -> Result<&Value> {
    self
      .payload
      .as_ref()
      .ok_or_else(|| Error::MissingField(format!("jsonPayload for {operation} operation")))
  }

  pub fn list_name(&self) -> Option<&str> {
    self
      .payload
      .as_ref()
      .and_then(|p| p.get(LIST_NAME))
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }

  /// The payload's fields other than `listName`, as a record.
  pub fn fields(&self) -> Result<Record> {
    match &self.payload {
      Some(payload) => Ok(Record::from_value(payload.clone())?.without(&[LIST_NAME])),
      None => Ok(Record::new()),
    }
  }
}
