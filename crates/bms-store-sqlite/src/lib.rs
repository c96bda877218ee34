//! SQLite backend for the BMS record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The warehouse schema is an attached
//! database, so schema-qualified names such as `GDEV1T_UHI_DATA.beneficiary`
//! resolve as they do in the production warehouse.

mod columns;
mod encode;
mod family;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
