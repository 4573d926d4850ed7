//! Error type for `finstat-store-sqlite`.

use finstat_core::{ErrorKind, StoreError, ValidationError};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] finstat_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<ValidationError> for Error {
  fn from(e: ValidationError) -> Self { Self::Core(e.into()) }
}

impl Error {
  /// The underlying SQLite failure, if this error came from the engine.
  fn sqlite_failure(&self) -> Option<&rusqlite::ffi::Error> {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(f, _),
      )) => Some(f),
      _ => None,
    }
  }

  pub(crate) fn is_unique_violation(&self) -> bool {
    self
      .sqlite_failure()
      .is_some_and(|f| f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
  }
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Database(tokio_rusqlite::Error::ConnectionClosed)
      | Self::Database(tokio_rusqlite::Error::Close(_)) => ErrorKind::Unavailable,
      Self::Database(_) => match self.sqlite_failure().map(|f| f.code) {
        Some(
          ErrorCode::DatabaseBusy
          | ErrorCode::DatabaseLocked
          | ErrorCode::CannotOpen
          | ErrorCode::SystemIoFailure
          | ErrorCode::DiskFull
          | ErrorCode::ReadOnly,
        ) => ErrorKind::Unavailable,
        Some(ErrorCode::ConstraintViolation) if self.is_unique_violation() => {
          ErrorKind::Conflict
        }
        _ => ErrorKind::Internal,
      },
      Self::Json(_) | Self::DateParse(_) => ErrorKind::Internal,
    }
  }
}
