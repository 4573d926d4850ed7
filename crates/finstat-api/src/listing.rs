//! Handlers for paged sequences.
//!
//! | Method | Path | Cursor |
//! |--------|------|--------|
//! | `GET`  | `/companies/{company}/statements` | last fiscal year |
//! | `GET`  | `/years/{fiscal_year}/statements` | last company |
//! | `POST` | `/statements/query` | last statement id; body is a [`PayloadPredicate`] |
//!
//! All three accept `?after=<cursor>&limit=<n>` and answer with
//! `{"items": [...], "next": <cursor or null>}`. Restart by omitting `after`.

use std::sync::Arc;

use axum::{Json, extract::State};
use finstat_core::{
  page::{Page, PageRequest},
  query::PayloadPredicate,
  statement::{FinancialStatement, StatementId},
  store::StatementStore,
};
use serde::Deserialize;

use crate::{
  error::ApiError,
  extract::{Body, PathParams, QueryParams},
};

#[derive(Debug, Deserialize)]
pub struct PageParams<C> {
  pub after: Option<C>,
  pub limit: Option<usize>,
}

impl<C> From<PageParams<C>> for PageRequest<C> {
  fn from(params: PageParams<C>) -> Self { PageRequest::new(params.after, params.limit) }
}

/// `GET /companies/{company}/statements[?after=<year>][&limit=<n>]`
pub async fn by_company<S>(
  State(store): State<Arc<S>>,
  PathParams(company): PathParams<String>,
  QueryParams(params): QueryParams<PageParams<i32>>,
) -> Result<Json<Page<FinancialStatement, i32>>, ApiError>
where
  S: StatementStore,
{
  let page = store
    .list_by_company(&company, params.into())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /years/{fiscal_year}/statements[?after=<company>][&limit=<n>]`
pub async fn by_year<S>(
  State(store): State<Arc<S>>,
  PathParams(fiscal_year): PathParams<i32>,
  QueryParams(params): QueryParams<PageParams<String>>,
) -> Result<Json<Page<FinancialStatement, String>>, ApiError>
where
  S: StatementStore,
{
  let page = store
    .list_by_year(fiscal_year, params.into())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /statements/query[?after=<id>][&limit=<n>]`
pub async fn query<S>(
  State(store): State<Arc<S>>,
  QueryParams(params): QueryParams<PageParams<StatementId>>,
  Body(predicate): Body<PayloadPredicate>,
) -> Result<Json<Page<FinancialStatement, StatementId>>, ApiError>
where
  S: StatementStore,
{
  let page = store
    .query_payload(&predicate, params.into())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}
