//! Error types for `bms-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The name did not resolve to an allow-listed table, or the resolved
  /// name failed validation.
  #[error("invalid table name: {0}")]
  InvalidTable(String),

  #[error("id is duplicate: {id} already exists in {table}")]
  DuplicateId { table: String, id: String },

  /// A column required on this path was absent, null, or blank.
  #[error("Missing required attribute: attribute is missed: {0}")]
  MissingAttribute(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("missing {0}")]
  MissingField(String),

  #[error("invalid payload: {0}")]
  InvalidPayload(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
