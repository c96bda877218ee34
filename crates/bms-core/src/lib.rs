//! Core types and trait definitions for the BMS gateway.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store and transport crates depend on it; it depends on nothing
//! proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod envelope;
pub mod error;
pub mod family;
pub mod record;
pub mod response;
pub mod store;
pub mod table;

pub use error::{Error, Result};
