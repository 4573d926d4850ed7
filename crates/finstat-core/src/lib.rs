//! Core types and trait definitions for the financial statement store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends and the HTTP adapter depend on it; it depends on nothing
//! beyond serde and chrono.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod index;
pub mod page;
pub mod payload;
pub mod query;
pub mod statement;
pub mod store;

pub use error::{Error, ErrorKind, Result, StoreError, ValidationError};
