//! Error types for `finstat-core`.

use thiserror::Error;

use crate::statement::StatementKey;

/// Why a statement, payload, or predicate was rejected before reaching
/// storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("company must not be empty")]
  EmptyCompany,

  #[error("fiscal year {0} is outside 1..=9999")]
  FiscalYearOutOfRange(i32),

  #[error("currency code {0:?} must be 1-16 non-whitespace characters")]
  InvalidCurrency(String),

  #[error("source filename must not be empty when present")]
  EmptySourceFilename,

  #[error("payload root must be a JSON object, found {0}")]
  PayloadNotObject(&'static str),

  #[error("payload nesting exceeds {0} levels")]
  PayloadTooDeep(usize),

  #[error("payload is {0} bytes, limit is {1}")]
  PayloadTooLarge(usize, usize),

  #[error("payload path must not be empty")]
  EmptyPath,

  #[error("invalid predicate: {0}")]
  InvalidPredicate(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(#[from] ValidationError),

  #[error("statement for {0} already exists")]
  Conflict(StatementKey),

  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse failure category shared by every backend.
///
/// Adapters (HTTP, CLI) branch on this rather than on backend-specific error
/// enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Input was rejected; nothing was written.
  Validation,
  /// The addressed record does not exist.
  NotFound,
  /// A concurrent or duplicate insert lost the race for a natural key.
  Conflict,
  /// The storage substrate could not be reached. Retryable.
  Unavailable,
  /// Anything else: corrupt rows, encoding bugs.
  Internal,
}

impl ErrorKind {
  pub fn is_retryable(self) -> bool { matches!(self, Self::Unavailable) }
}

/// An error produced by a [`StatementStore`](crate::store::StatementStore)
/// backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::Conflict(_) => ErrorKind::Conflict,
      Self::StorageUnavailable(_) => ErrorKind::Unavailable,
      Self::Serialization(_) => ErrorKind::Internal,
    }
  }
}
