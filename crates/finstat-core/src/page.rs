//! Keyset pagination for the list and query operations.
//!
//! Every listing is a finite, deterministic sequence delivered one page at a
//! time. A caller walks it by feeding each page's `next` cursor back in as
//! `after`, and restarts it by sending `after: None`. Pages are independent
//! reads, so abandoning a walk part-way has no effect on the store.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Which slice of a sequence to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest<C> {
  /// Exclusive lower bound in the sequence's sort order.
  pub after: Option<C>,
  pub limit: usize,
}

impl<C> PageRequest<C> {
  /// The beginning of the sequence with the default page size.
  pub fn first() -> Self { Self { after: None, limit: DEFAULT_PAGE_LIMIT } }

  pub fn new(after: Option<C>, limit: Option<usize>) -> Self {
    Self { after, limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT) }
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  /// `limit` clamped into `1..=MAX_PAGE_LIMIT`.
  pub fn effective_limit(&self) -> usize { self.limit.clamp(1, MAX_PAGE_LIMIT) }
}

impl<C> Default for PageRequest<C> {
  fn default() -> Self { Self::first() }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T, C> {
  pub items: Vec<T>,
  /// Cursor for the following page; `None` once the sequence is exhausted.
  pub next:  Option<C>,
}

impl<T, C: Clone> Page<T, C> {
  /// Build a page from rows fetched with `limit`, taking the cursor from the
  /// last scanned row. A short scan means the sequence is exhausted.
  ///
  /// `scanned` may exceed `items.len()` when a backend drops index candidates
  /// on re-check; the cursor still advances past them.
  pub fn from_scan(items: Vec<T>, scanned: usize, last: Option<C>, limit: usize) -> Self {
    let next = if scanned >= limit { last } else { None };
    Self { items, next }
  }

  /// Request for the page after this one, if any.
  pub fn next_request(&self, limit: usize) -> Option<PageRequest<C>> {
    self
      .next
      .clone()
      .map(|after| PageRequest { after: Some(after), limit })
  }
}
