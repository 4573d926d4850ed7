//! [`SqliteStore`], the SQLite implementation of [`StatementStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use finstat_core::{
  Error as CoreError,
  page::{Page, PageRequest},
  query::PayloadPredicate,
  statement::{FinancialStatement, NewStatement, PutOutcome, StatementId, StatementKey},
  store::StatementStore,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{IndexRow, RawStatement, STATEMENT_COLUMNS, encode_date, encode_dt, index_rows},
  predicate,
  schema::SCHEMA,
};

/// How long a writer waits on another process's lock before reporting the
/// database as unavailable.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A statement store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. All calls
/// on one store are executed in order on the connection's thread; writers in
/// other processes are serialised by `BEGIN IMMEDIATE`.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Column values for an insert or replace, owned so they can move onto the
/// connection thread.
struct WriteRow {
  company:         String,
  fiscal_year:     i32,
  period_end:      Option<String>,
  currency:        Option<String>,
  source_filename: Option<String>,
  payload:         String,
  created_at:      String,
  index:           Vec<IndexRow>,
}

impl WriteRow {
  fn new(input: NewStatement) -> Result<Self> {
    let input = input.validate()?;
    Ok(Self {
      index:           index_rows(&input.payload),
      payload:         input.payload.to_json_string(),
      company:         input.company,
      fiscal_year:     input.fiscal_year,
      period_end:      input.period_end.map(encode_date),
      currency:        input.currency,
      source_filename: input.source_filename,
      created_at:      encode_dt(Utc::now()),
    })
  }

  fn key(&self) -> StatementKey { StatementKey::new(self.company.clone(), self.fiscal_year) }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory database.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `sql` (which must select [`STATEMENT_COLUMNS`]) and decode the rows.
  async fn fetch_all(
    &self,
    sql: String,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<FinancialStatement>> {
    let raws: Vec<RawStatement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawStatement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatement::into_statement).collect()
  }

  async fn fetch_one(
    &self,
    sql: &'static str,
    param: rusqlite::types::Value,
    param2: Option<rusqlite::types::Value>,
  ) -> Result<Option<FinancialStatement>> {
    let raw: Option<RawStatement> = self
      .conn
      .call(move |conn| {
        let params: Vec<_> = std::iter::once(param).chain(param2).collect();
        Ok(
          conn
            .query_row(sql, rusqlite::params_from_iter(params), RawStatement::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStatement::into_statement).transpose()
  }
}

/// Replace every structural index row of `id` with `rows`.
fn rewrite_index(
  tx: &rusqlite::Transaction<'_>,
  id: i64,
  rows: &[IndexRow],
) -> rusqlite::Result<()> {
  tx.execute(
    "DELETE FROM payload_index WHERE statement_id = ?1",
    rusqlite::params![id],
  )?;
  let mut stmt = tx.prepare_cached(
    "INSERT INTO payload_index (statement_id, path, kind, num, txt)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for row in rows {
    stmt.execute(rusqlite::params![id, row.path, row.kind, row.num, row.txt])?;
  }
  Ok(())
}

/// Insert or replace the row for `row`'s key and rewrite its index rows.
fn upsert_row(
  tx: &rusqlite::Transaction<'_>,
  row: &WriteRow,
) -> rusqlite::Result<RawStatement> {
  let raw = tx.query_row(
    &format!(
      "INSERT INTO financial_statements (
         company, fiscal_year, period_end, currency,
         source_filename, payload, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
       ON CONFLICT (company, fiscal_year) DO UPDATE SET
         period_end      = excluded.period_end,
         currency        = excluded.currency,
         source_filename = excluded.source_filename,
         payload         = excluded.payload
       RETURNING {STATEMENT_COLUMNS}"
    ),
    rusqlite::params![
      row.company,
      row.fiscal_year,
      row.period_end,
      row.currency,
      row.source_filename,
      row.payload,
      row.created_at,
    ],
    RawStatement::from_row,
  )?;
  rewrite_index(tx, raw.id, &row.index)?;
  Ok(raw)
}

/// Decode a row on the connection thread, reporting corrupt columns as a
/// conversion failure.
fn decode_in_transaction(raw: RawStatement) -> rusqlite::Result<FinancialStatement> {
  raw.into_statement().map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
  })
}

// ─── StatementStore impl ─────────────────────────────────────────────────────

impl StatementStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn put(&self, input: NewStatement) -> Result<PutOutcome> {
    let row = WriteRow::new(input)?;
    let key = row.key();

    // The existence check and the upsert share one IMMEDIATE transaction, so
    // `created` is exact and the ON CONFLICT clause is the only path to a
    // second write for this key.
    let (raw, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existed = tx
          .query_row(
            "SELECT 1 FROM financial_statements WHERE company = ?1 AND fiscal_year = ?2",
            rusqlite::params![row.company, row.fiscal_year],
            |_| Ok(()),
          )
          .optional()?
          .is_some();

        let raw = upsert_row(&tx, &row)?;
        tx.commit()?;
        Ok((raw, !existed))
      })
      .await
      .inspect_err(|e| tracing::warn!(%key, error = %e, "statement put failed"))?;

    let statement = raw.into_statement()?;
    tracing::debug!(%key, id = %statement.id, created, "statement stored");
    Ok(PutOutcome { statement, created })
  }

  async fn put_if<P>(&self, input: NewStatement, precondition: P) -> Result<Option<PutOutcome>>
  where
    P: FnOnce(Option<&FinancialStatement>) -> bool + Send + 'static,
  {
    let row = WriteRow::new(input)?;
    let key = row.key();

    // Dropping `tx` without committing rolls back, which leaves nothing to
    // undo when the precondition refuses.
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
          .query_row(
            SELECT_BY_KEY,
            rusqlite::params![row.company, row.fiscal_year],
            RawStatement::from_row,
          )
          .optional()?
          .map(decode_in_transaction)
          .transpose()?;
        if !precondition(current.as_ref()) {
          return Ok(None);
        }

        let raw = upsert_row(&tx, &row)?;
        tx.commit()?;
        Ok(Some((raw, current.is_none())))
      })
      .await
      .inspect_err(|e| tracing::warn!(%key, error = %e, "conditional put failed"))?;

    let Some((raw, created)) = written else {
      tracing::debug!(%key, "conditional put refused");
      return Ok(None);
    };
    let statement = raw.into_statement()?;
    tracing::debug!(%key, id = %statement.id, created, "statement stored");
    Ok(Some(PutOutcome { statement, created }))
  }

  async fn insert(&self, input: NewStatement) -> Result<FinancialStatement> {
    let row = WriteRow::new(input)?;
    let key = row.key();

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = tx.query_row(
          &format!(
            "INSERT INTO financial_statements (
               company, fiscal_year, period_end, currency,
               source_filename, payload, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {STATEMENT_COLUMNS}"
          ),
          rusqlite::params![
            row.company,
            row.fiscal_year,
            row.period_end,
            row.currency,
            row.source_filename,
            row.payload,
            row.created_at,
          ],
          RawStatement::from_row,
        )?;
        rewrite_index(&tx, raw.id, &row.index)?;
        tx.commit()?;
        Ok(raw)
      })
      .await
      .map_err(Error::from);

    let raw = match result {
      Ok(raw) => raw,
      Err(e) if e.is_unique_violation() => {
        tracing::debug!(%key, "insert rejected: key exists");
        return Err(CoreError::Conflict(key).into());
      }
      Err(e) => {
        tracing::warn!(%key, error = %e, "statement insert failed");
        return Err(e);
      }
    };

    let statement = raw.into_statement()?;
    tracing::debug!(%key, id = %statement.id, "statement inserted");
    Ok(statement)
  }

  // ── Point reads ───────────────────────────────────────────────────────────

  async fn get_by_key(&self, key: &StatementKey) -> Result<Option<FinancialStatement>> {
    self
      .fetch_one(
        SELECT_BY_KEY,
        key.company.trim().to_owned().into(),
        Some(key.fiscal_year.into()),
      )
      .await
  }

  async fn get_by_id(&self, id: StatementId) -> Result<Option<FinancialStatement>> {
    self
      .fetch_one(SELECT_BY_ID, id.0.into(), None)
      .await
  }

  // ── Sequences ─────────────────────────────────────────────────────────────

  async fn list_by_company(
    &self,
    company: &str,
    page: PageRequest<i32>,
  ) -> Result<Page<FinancialStatement, i32>> {
    let limit = page.effective_limit();
    let items = self
      .fetch_all(
        format!(
          "SELECT {STATEMENT_COLUMNS} FROM financial_statements
           WHERE company = ? AND fiscal_year > ?
           ORDER BY fiscal_year
           LIMIT ?"
        ),
        vec![
          company.trim().to_owned().into(),
          page.after.unwrap_or(i32::MIN).into(),
          (limit as i64).into(),
        ],
      )
      .await?;

    let scanned = items.len();
    let last = items.last().map(|s| s.fiscal_year);
    Ok(Page::from_scan(items, scanned, last, limit))
  }

  async fn list_by_year(
    &self,
    fiscal_year: i32,
    page: PageRequest<String>,
  ) -> Result<Page<FinancialStatement, String>> {
    let limit = page.effective_limit();
    let after: rusqlite::types::Value = match page.after {
      Some(company) => company.into(),
      None => rusqlite::types::Value::Null,
    };
    let items = self
      .fetch_all(
        format!(
          "SELECT {STATEMENT_COLUMNS} FROM financial_statements
           WHERE fiscal_year = ?1 AND (?2 IS NULL OR company > ?2)
           ORDER BY company
           LIMIT ?3"
        ),
        vec![fiscal_year.into(), after, (limit as i64).into()],
      )
      .await?;

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
    let fragment = predicate::compile(predicate);

    let mut params = fragment.params;
    params.push(page.after.map_or(i64::MIN, |id| id.0).into());
    params.push((limit as i64).into());

    let candidates = self
      .fetch_all(
        format!(
          "SELECT {STATEMENT_COLUMNS} FROM financial_statements
           WHERE id IN ({}) AND id > ?
           ORDER BY id
           LIMIT ?",
          fragment.sql
        ),
        params,
      )
      .await?;

    let scanned = candidates.len();
    let last = candidates.last().map(|s| s.id);
    let items: Vec<_> = candidates
      .into_iter()
      .filter(|s| predicate.matches(&s.payload))
      .collect();
    tracing::trace!(scanned, matched = items.len(), "payload query page");
    Ok(Page::from_scan(items, scanned, last, limit))
  }
}

const SELECT_BY_KEY: &str = "SELECT id, company, fiscal_year, period_end, currency, \
   source_filename, payload, created_at FROM financial_statements \
   WHERE company = ?1 AND fiscal_year = ?2";

const SELECT_BY_ID: &str = "SELECT id, company, fiscal_year, period_end, currency, \
   source_filename, payload, created_at FROM financial_statements WHERE id = ?1";
