//! Error type for `bms-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(bms_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<bms_core::Error> for Error {
  fn from(err: bms_core::Error) -> Self { Self::Core(err) }
}

/// Domain errors raised inside a `Connection::call` closure travel as
/// `tokio_rusqlite::Error::Other` and are unwrapped here.
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(inner) => {
        match inner.downcast::<bms_core::Error>() {
          Ok(core) => Self::Core(*core),
          Err(other) => Self::Database(tokio_rusqlite::Error::Other(other)),
        }
      }
      other => Self::Database(other),
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Self::Database(tokio_rusqlite::Error::Rusqlite(err))
  }
}

impl From<Error> for bms_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(core) => core,
      Error::Json(e) => bms_core::Error::Serialization(e),
      other => bms_core::Error::Backend(Box::new(other)),
    }
  }
}

/// Abort a `Connection::call` closure with a domain error.
pub(crate) fn abort(err: bms_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

/// `true` for primary-key and unique-constraint violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}
