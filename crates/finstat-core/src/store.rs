//! The `StatementStore` trait.
//!
//! The trait is implemented by storage backends (`finstat-store-sqlite`,
//! `finstat-store-memory`). Higher layers (`finstat-api`, the server binary)
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  StoreError,
  page::{Page, PageRequest},
  query::PayloadPredicate,
  statement::{FinancialStatement, NewStatement, PutOutcome, StatementId, StatementKey},
};

/// Abstraction over a statement store backend.
///
/// Writes are whole-record: a statement is created once per natural key and
/// afterwards only ever replaced in full. Every successful write updates the
/// company, fiscal-year and structural indexes in the same atomic unit, so no
/// reader observes a record without its index entries or an index entry
/// pointing at a superseded payload.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait StatementStore: Send + Sync {
  type Error: StoreError;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert or replace the statement for `input`'s natural key.
  ///
  /// A new key gets a fresh id and `created_at`. An existing key keeps both
  /// and has its payload, currency, period end and source filename replaced.
  /// Concurrent calls for one key are serialised: each observes the effect of
  /// the one before it.
  fn put(
    &self,
    input: NewStatement,
  ) -> impl Future<Output = Result<PutOutcome, Self::Error>> + Send + '_;

  /// [`put`](Self::put), applied only if `precondition` accepts the
  /// statement currently stored under the key (`None` when there is none).
  ///
  /// The check and the write are one atomic unit: no other write for the key
  /// lands between them. Returns `Ok(None)`, having written nothing, when the
  /// precondition refuses.
  fn put_if<P>(
    &self,
    input: NewStatement,
    precondition: P,
  ) -> impl Future<Output = Result<Option<PutOutcome>, Self::Error>> + Send + '_
  where
    P: FnOnce(Option<&FinancialStatement>) -> bool + Send + 'static;

  /// Create a statement, failing with a conflict if the key already exists.
  fn insert(
    &self,
    input: NewStatement,
  ) -> impl Future<Output = Result<FinancialStatement, Self::Error>> + Send + '_;

  // ── Point reads ───────────────────────────────────────────────────────

  /// Retrieve a statement by natural key. Returns `None` if not found.
  fn get_by_key<'a>(
    &'a self,
    key: &'a StatementKey,
  ) -> impl Future<Output = Result<Option<FinancialStatement>, Self::Error>> + Send + 'a;

  /// Retrieve a statement by store id. Returns `None` if not found.
  fn get_by_id(
    &self,
    id: StatementId,
  ) -> impl Future<Output = Result<Option<FinancialStatement>, Self::Error>> + Send + '_;

  // ── Sequences ─────────────────────────────────────────────────────────

  /// All statements for `company`, ascending by fiscal year. The cursor is
  /// the last fiscal year returned.
  fn list_by_company<'a>(
    &'a self,
    company: &'a str,
    page: PageRequest<i32>,
  ) -> impl Future<Output = Result<Page<FinancialStatement, i32>, Self::Error>> + Send + 'a;

  /// All statements for `fiscal_year`, ascending by company. The cursor is the
  /// last company returned.
  fn list_by_year(
    &self,
    fiscal_year: i32,
    page: PageRequest<String>,
  ) -> impl Future<Output = Result<Page<FinancialStatement, String>, Self::Error>> + Send + '_;

  /// Statements whose payload satisfies `predicate`, ascending by id. The
  /// cursor is the last id scanned.
  fn query_payload<'a>(
    &'a self,
    predicate: &'a PayloadPredicate,
    page: PageRequest<StatementId>,
  ) -> impl Future<Output = Result<Page<FinancialStatement, StatementId>, Self::Error>>
  + Send
  + 'a;
}
