//! JSON HTTP API for the statement store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`finstat_core::store::StatementStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = finstat_api::api_router(Arc::new(store));
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Request size
//!
//! Payloads are limited by their compact encoding
//! ([`MAX_PAYLOAD_BYTES`]) and an oversized payload is answered with 422.
//! The raw request body is limited separately to [`BODY_LIMIT`] so indented
//! or otherwise padded JSON still reaches validation; bodies beyond that are
//! refused with 413 before they are parsed.

pub mod error;
pub mod etag;
pub mod extract;
pub mod listing;
pub mod statements;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use finstat_core::{payload::MAX_PAYLOAD_BYTES, store::StatementStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Largest request body read, whitespace included.
pub const BODY_LIMIT: usize = 4 * MAX_PAYLOAD_BYTES;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: StatementStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Statements
    .route("/statements", post(statements::create::<S>))
    .route("/statements/query", post(listing::query::<S>))
    .route("/statements/by-id/{id}", get(statements::get_by_id::<S>))
    .route(
      "/statements/{company}/{fiscal_year}",
      get(statements::get_one::<S>).put(statements::put_one::<S>),
    )
    // Sequences
    .route("/companies/{company}/statements", get(listing::by_company::<S>))
    .route("/years/{fiscal_year}/statements", get(listing::by_year::<S>))
    .layer(DefaultBodyLimit::max(BODY_LIMIT))
    .with_state(store)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
