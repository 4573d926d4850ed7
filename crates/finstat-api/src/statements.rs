//! Handlers for single-statement endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/statements/{company}/{fiscal_year}` | Body: [`PutBody`]; 201 or 200; `If-Match` |
//! | `POST` | `/statements` | Body: [`NewStatement`]; 201, or 409 if the key exists |
//! | `GET`  | `/statements/{company}/{fiscal_year}` | 404 if not found |
//! | `GET`  | `/statements/by-id/{id}` | 404 if not found |
//!
//! Every response carrying a statement also carries its `ETag`.

use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use finstat_core::{
  payload::Payload,
  statement::{FinancialStatement, NewStatement, StatementId, StatementKey},
  store::StatementStore,
};
use serde::Deserialize;

use crate::{
  error::ApiError,
  etag::{compute_etag, if_match, precondition_holds},
  extract::{Body, PathParams},
};

fn with_etag(status: StatusCode, statement: FinancialStatement) -> Response {
  let etag = compute_etag(&statement);
  (status, [(header::ETAG, etag)], Json(statement)).into_response()
}

// ─── Put ──────────────────────────────────────────────────────────────────────

/// Replaceable fields of a statement; the key comes from the path.
#[derive(Debug, Deserialize)]
pub struct PutBody {
  #[serde(default)]
  pub period_end:      Option<NaiveDate>,
  #[serde(default)]
  pub currency:        Option<String>,
  #[serde(default)]
  pub source_filename: Option<String>,
  pub payload:         Payload,
}

/// `PUT /statements/{company}/{fiscal_year}`
pub async fn put_one<S>(
  State(store): State<Arc<S>>,
  PathParams((company, fiscal_year)): PathParams<(String, i32)>,
  headers: HeaderMap,
  Body(body): Body<PutBody>,
) -> Result<Response, ApiError>
where
  S: StatementStore,
{
  let input = NewStatement {
    company,
    fiscal_year,
    period_end: body.period_end,
    currency: body.currency,
    source_filename: body.source_filename,
    payload: body.payload,
  }
  .validate()
  .map_err(ApiError::validation)?;

  let outcome = match if_match(&headers) {
    Some(expected) => {
      let key = input.key();
      let expected = expected.to_owned();
      let tag = expected.clone();
      store
        .put_if(input, move |current| precondition_holds(&expected, current))
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| {
          ApiError::PreconditionFailed(format!("statement {key} does not match {tag}"))
        })?
    }
    None => store.put(input).await.map_err(ApiError::store)?,
  };

  let status = if outcome.created {
    StatusCode::CREATED
  } else {
    StatusCode::OK
  };
  Ok(with_etag(status, outcome.statement))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /statements`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Body(input): Body<NewStatement>,
) -> Result<Response, ApiError>
where
  S: StatementStore,
{
  let statement = store.insert(input).await.map_err(ApiError::store)?;
  let location = format!("/statements/by-id/{}", statement.id);
  let mut response = with_etag(StatusCode::CREATED, statement);
  if let Ok(value) = location.parse() {
    response.headers_mut().insert(header::LOCATION, value);
  }
  Ok(response)
}

// ─── Get ──────────────────────────────────────────────────────────────────────

/// `GET /statements/{company}/{fiscal_year}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  PathParams((company, fiscal_year)): PathParams<(String, i32)>,
) -> Result<Response, ApiError>
where
  S: StatementStore,
{
  let key = StatementKey::new(company, fiscal_year);
  let statement = store
    .get_by_key(&key)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("statement {key} not found")))?;
  Ok(with_etag(StatusCode::OK, statement))
}

/// `GET /statements/by-id/{id}`
pub async fn get_by_id<S>(
  State(store): State<Arc<S>>,
  PathParams(id): PathParams<StatementId>,
) -> Result<Response, ApiError>
where
  S: StatementStore,
{
  let statement = store
    .get_by_id(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("statement {id} not found")))?;
  Ok(with_etag(StatusCode::OK, statement))
}
