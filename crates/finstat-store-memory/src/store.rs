//! [`MemoryStore`], the in-process implementation of [`StatementStore`].

use std::{
  collections::{BTreeMap, BTreeSet},
  ops::Bound,
};

use chrono::Utc;
use finstat_core::{
  Error, Result,
  index::flatten,
  page::{Page, PageRequest},
  query::PayloadPredicate,
  statement::{FinancialStatement, NewStatement, PutOutcome, StatementId, StatementKey},
  store::StatementStore,
};
use tokio::sync::RwLock;

use crate::index::PayloadIndex;

#[derive(Debug, Default)]
struct Inner {
  last_id:    i64,
  records:    BTreeMap<StatementId, FinancialStatement>,
  /// company → fiscal_year → id. Doubles as the uniqueness constraint.
  by_company: BTreeMap<String, BTreeMap<i32, StatementId>>,
  /// fiscal_year → company → id.
  by_year:    BTreeMap<i32, BTreeMap<String, StatementId>>,
  payload:    PayloadIndex,
}

impl Inner {
  fn id_for(&self, company: &str, fiscal_year: i32) -> Option<StatementId> {
    self
      .by_company
      .get(company)
      .and_then(|years| years.get(&fiscal_year))
      .copied()
  }

  fn create(&mut self, input: NewStatement) -> FinancialStatement {
    self.last_id += 1;
    let id = StatementId(self.last_id);
    let statement = FinancialStatement {
      id,
      company: input.company,
      fiscal_year: input.fiscal_year,
      period_end: input.period_end,
      currency: input.currency,
      source_filename: input.source_filename,
      payload: input.payload,
      created_at: Utc::now(),
    };

    self
      .by_company
      .entry(statement.company.clone())
      .or_default()
      .insert(statement.fiscal_year, id);
    self
      .by_year
      .entry(statement.fiscal_year)
      .or_default()
      .insert(statement.company.clone(), id);
    self.payload.insert(id, &flatten(&statement.payload));
    self.records.insert(id, statement.clone());
    statement
  }
}

impl Inner {
  fn current(&self, key: &StatementKey) -> Option<&FinancialStatement> {
    self
      .id_for(&key.company, key.fiscal_year)
      .and_then(|id| self.records.get(&id))
  }

  fn upsert(&mut self, input: NewStatement) -> PutOutcome {
    let existing = self
      .id_for(&input.company, input.fiscal_year)
      .and_then(|id| self.records.get_mut(&id));
    match existing {
      Some(record) => {
        replace(&mut self.payload, record, input);
        PutOutcome { statement: record.clone(), created: false }
      }
      None => PutOutcome { statement: self.create(input), created: true },
    }
  }
}

/// Swap the mutable columns of an existing record, re-indexing its payload.
fn replace(index: &mut PayloadIndex, record: &mut FinancialStatement, input: NewStatement) {
  index.remove(record.id, &flatten(&record.payload));

  record.period_end = input.period_end;
  record.currency = input.currency;
  record.source_filename = input.source_filename;
  record.payload = input.payload;

  index.insert(record.id, &flatten(&record.payload));
}

/// A volatile statement store.
///
/// Each operation takes the lock once and does no further awaiting while it
/// holds it, so a dropped write future either never started or finished.
#[derive(Debug, Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Number of stored statements.
  pub async fn len(&self) -> usize { self.inner.read().await.records.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

impl StatementStore for MemoryStore {
  type Error = Error;

  async fn put(&self, input: NewStatement) -> Result<PutOutcome> {
    let input = input.validate()?;
    let key = input.key();

    let outcome = self.inner.write().await.upsert(input);

    tracing::debug!(
      %key,
      id = %outcome.statement.id,
      created = outcome.created,
      "statement stored"
    );
    Ok(outcome)
  }

  async fn put_if<P>(&self, input: NewStatement, precondition: P) -> Result<Option<PutOutcome>>
  where
    P: FnOnce(Option<&FinancialStatement>) -> bool + Send + 'static,
  {
    let input = input.validate()?;
    let key = input.key();

    let mut inner = self.inner.write().await;
    if !precondition(inner.current(&key)) {
      drop(inner);
      tracing::debug!(%key, "conditional put refused");
      return Ok(None);
    }
    let outcome = inner.upsert(input);
    drop(inner);

    tracing::debug!(
      %key,
      id = %outcome.statement.id,
      created = outcome.created,
      "statement stored"
    );
    Ok(Some(outcome))
  }

  async fn insert(&self, input: NewStatement) -> Result<FinancialStatement> {
    let input = input.validate()?;
    let key = input.key();

    let mut inner = self.inner.write().await;
    if inner.id_for(&key.company, key.fiscal_year).is_some() {
      tracing::debug!(%key, "insert rejected: key exists");
      return Err(Error::Conflict(key));
    }
    let statement = inner.create(input);
    drop(inner);

    tracing::debug!(%key, id = %statement.id, "statement inserted");
    Ok(statement)
  }

  async fn get_by_key(&self, key: &StatementKey) -> Result<Option<FinancialStatement>> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .current(&StatementKey::new(key.company.trim(), key.fiscal_year))
        .cloned(),
    )
  }

  async fn get_by_id(&self, id: StatementId) -> Result<Option<FinancialStatement>> {
    Ok(self.inner.read().await.records.get(&id).cloned())
  }

  async fn list_by_company(
    &self,
    company: &str,
    page: PageRequest<i32>,
  ) -> Result<Page<FinancialStatement, i32>> {
    let limit = page.effective_limit();
    let lower = page.after.map_or(Bound::Unbounded, Bound::Excluded);

    let inner = self.inner.read().await;
    let rows: Vec<(i32, FinancialStatement)> = inner
      .by_company
      .get(company.trim())
      .into_iter()
      .flat_map(|years| years.range((lower, Bound::Unbounded)))
      .take(limit)
      .filter_map(|(year, id)| inner.records.get(id).map(|s| (*year, s.clone())))
      .collect();
    drop(inner);

    let scanned = rows.len();
    let last = rows.last().map(|(year, _)| *year);
    let items = rows.into_iter().map(|(_, s)| s).collect();
    Ok(Page::from_scan(items, scanned, last, limit))
  }

  async fn list_by_year(
    &self,
    fiscal_year: i32,
    page: PageRequest<String>,
  ) -> Result<Page<FinancialStatement, String>> {
    let limit = page.effective_limit();

    let inner = self.inner.read().await;
    let items: Vec<FinancialStatement> = match inner.by_year.get(&fiscal_year) {
      Some(companies) => {
        let lower = match page.after.as_deref() {
          Some(after) => Bound::Excluded(after),
          None => Bound::Unbounded,
        };
        companies
          .range::<str, _>((lower, Bound::Unbounded))
          .take(limit)
          .filter_map(|(_, id)| inner.records.get(id).cloned())
          .collect()
      }
      None => Vec::new(),
    };
    drop(inner);

    let scanned = items.len();
    let last = items.last().map(|s| s.company.clone());
    Ok(Page::from_scan(items, scanned, last, limit))
  }

  async fn query_payload(
    &self,
    predicate: &PayloadPredicate,
    page: PageRequest<StatementId>,
  ) -> Result<Page<FinancialStatement, StatementId>> {
    predicate.validate()?;
    let limit = page.effective_limit();
    let lower = page.after.map_or(Bound::Unbounded, Bound::Excluded);

    let inner = self.inner.read().await;
    let all = || inner.records.keys().copied().collect::<BTreeSet<_>>();
    let candidates = inner.payload.candidates(predicate, &all);

    let scanned: Vec<StatementId> = candidates
      .range((lower, Bound::Unbounded))
      .take(limit)
      .copied()
      .collect();
    let items: Vec<FinancialStatement> = scanned
      .iter()
      .filter_map(|id| inner.records.get(id))
      .filter(|s| predicate.matches(&s.payload))
      .cloned()
      .collect();
    drop(inner);

    tracing::trace!(scanned = scanned.len(), matched = items.len(), "payload query page");
    Ok(Page::from_scan(items, scanned.len(), scanned.last().copied(), limit))
  }
}
