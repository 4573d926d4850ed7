//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use finstat_core::{ErrorKind, StoreError, ValidationError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  /// An extractor refused the request; axum already picked the status.
  #[error("{message}")]
  Rejected { status: StatusCode, message: String },

  #[error("{source}")]
  Store {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  /// Wrap a backend error, keeping its classification.
  pub fn store<E: StoreError>(err: E) -> Self {
    Self::Store { kind: err.kind(), source: Box::new(err) }
  }

  pub fn validation(err: ValidationError) -> Self {
    Self::store(finstat_core::Error::from(err))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
      Self::Rejected { status, .. } => *status,
      Self::Store { kind, .. } => match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::Rejected { status: rejection.status(), message: rejection.body_text() }
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::Rejected { status: rejection.status(), message: rejection.body_text() }
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self::Rejected { status: rejection.status(), message: rejection.body_text() }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::warn!(%status, error = %self, "request failed");
    }

    let body = Json(json!({ "error": self.to_string() }));
    match &self {
      Self::Store { kind, .. } if kind.is_retryable() => {
        (status, [(header::RETRY_AFTER, "1")], body).into_response()
      }
      _ => (status, body).into_response(),
    }
  }
}

#[cfg(test)]
mod tests {
  use finstat_core::Error;

  use super::*;

  #[test]
  fn kinds_map_to_statuses() {
    let cases = [
      (ApiError::validation(ValidationError::EmptyCompany), StatusCode::UNPROCESSABLE_ENTITY),
      (
        ApiError::store(Error::Conflict(finstat_core::statement::StatementKey::new("Acme", 2023))),
        StatusCode::CONFLICT,
      ),
      (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
      (ApiError::PreconditionFailed("x".into()), StatusCode::PRECONDITION_FAILED),
    ];
    for (err, status) in cases {
      assert_eq!(err.status(), status);
    }
  }

  #[test]
  fn unavailable_store_is_retryable_503() {
    let err = ApiError::store(Error::StorageUnavailable("database is locked".into()));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers()[header::RETRY_AFTER], "1");
  }

  #[test]
  fn other_failures_carry_no_retry_hint() {
    let resp = ApiError::NotFound("statement Acme/2023".into()).into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(!resp.headers().contains_key(header::RETRY_AFTER));
  }
}
