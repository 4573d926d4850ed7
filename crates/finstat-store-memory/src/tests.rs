//! Behavioural tests for `MemoryStore`.

use std::sync::Arc;

use finstat_core::{
  ErrorKind, StoreError as _,
  page::PageRequest,
  payload::Payload,
  query::{Comparison, MAX_PREDICATE_OPERANDS, PayloadPredicate},
  statement::{NewStatement, StatementId, StatementKey},
  store::StatementStore,
};
use serde_json::{Value, json};

use crate::MemoryStore;

fn statement(company: &str, year: i32, payload: Value) -> NewStatement {
  NewStatement::new(company, year, Payload::new(payload).unwrap())
}

fn key(company: &str, year: i32) -> StatementKey { StatementKey::new(company, year) }

async fn companies(s: &MemoryStore, p: &PayloadPredicate) -> Vec<String> {
  s.query_payload(p, PageRequest::first())
    .await
    .unwrap()
    .items
    .into_iter()
    .map(|st| st.company)
    .collect()
}

#[tokio::test]
async fn put_get_and_replace() {
  let s = MemoryStore::new();
  let first = s
    .put(statement("Acme", 2023, json!({ "revenue": 1000000, "currency": "USD" })))
    .await
    .unwrap();
  assert!(first.created);

  let got = s.get_by_key(&key("Acme", 2023)).await.unwrap().unwrap();
  assert_eq!(got, first.statement);

  let second = s
    .put(statement("Acme", 2023, json!({ "revenue": 1050000, "currency": "USD" })))
    .await
    .unwrap();
  assert!(!second.created);
  assert_eq!(second.statement.id, first.statement.id);
  assert_eq!(second.statement.created_at, first.statement.created_at);
  assert_eq!(s.len().await, 1);

  let got = s.get_by_id(first.statement.id).await.unwrap().unwrap();
  assert_eq!(got.payload.as_value()["revenue"], json!(1050000));

  let p = PayloadPredicate::compare("revenue", Comparison::Gt, 1000000.0).unwrap();
  assert_eq!(companies(&s, &p).await, vec!["Acme"]);
}

#[tokio::test]
async fn missing_records_are_none() {
  let s = MemoryStore::new();
  assert!(s.is_empty().await);
  assert!(s.get_by_key(&key("Acme", 2023)).await.unwrap().is_none());
  assert!(s.get_by_id(StatementId(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn insert_conflicts_on_existing_key() {
  let s = MemoryStore::new();
  s.insert(statement("Acme", 2023, json!({}))).await.unwrap();
  let err = s.insert(statement("Acme", 2023, json!({}))).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert_eq!(s.len().await, 1);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
  let s = MemoryStore::new();
  let err = s.put(statement(" ", 2023, json!({}))).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(s.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_serialise_per_key() {
  let s = Arc::new(MemoryStore::new());
  let handles: Vec<_> = (0..32)
    .map(|i| {
      let s = Arc::clone(&s);
      tokio::spawn(async move {
        s.put(statement("Race", 2024, json!({ "writer": i }))).await
      })
    })
    .collect();

  let mut created = 0;
  for h in handles {
    if h.await.unwrap().unwrap().created {
      created += 1;
    }
  }
  assert_eq!(created, 1);
  assert_eq!(s.len().await, 1);
}

#[tokio::test]
async fn listings_are_ordered_and_paged() {
  let s = MemoryStore::new();
  let keys = [("Zeta", 2023), ("Acme", 2024), ("Acme", 2022), ("Mid", 2023), ("Acme", 2023)];
  for (company, year) in keys {
    s.put(statement(company, year, json!({}))).await.unwrap();
  }

  let page = s
    .list_by_company("Acme", PageRequest::first().with_limit(2))
    .await
    .unwrap();
  let years: Vec<_> = page.items.iter().map(|st| st.fiscal_year).collect();
  assert_eq!(years, vec![2022, 2023]);
  let rest = s
    .list_by_company("Acme", page.next_request(2).unwrap())
    .await
    .unwrap();
  assert_eq!(rest.items[0].fiscal_year, 2024);
  assert!(rest.next.is_none());

  let page = s.list_by_year(2023, PageRequest::first()).await.unwrap();
  let names: Vec<_> = page.items.iter().map(|st| st.company.as_str()).collect();
  assert_eq!(names, vec!["Acme", "Mid", "Zeta"]);
  assert!(page.next.is_none());
}

#[tokio::test]
async fn replacement_updates_structural_index() {
  let s = MemoryStore::new();
  s.put(statement("Acme", 2023, json!({ "old": { "value": 5 } }))).await.unwrap();
  s.put(statement("Acme", 2023, json!({ "new": [ { "value": 6 } ] }))).await.unwrap();

  assert!(companies(&s, &PayloadPredicate::exists("old").unwrap()).await.is_empty());
  assert!(
    companies(&s, &PayloadPredicate::eq("old.value", 5).unwrap())
      .await
      .is_empty()
  );
  assert_eq!(
    companies(&s, &PayloadPredicate::eq("new.value", 6).unwrap()).await,
    vec!["Acme"]
  );
}

#[tokio::test]
async fn containment_and_paging() {
  let s = MemoryStore::new();
  for (i, currency) in ["USD", "CAD", "USD", "USD"].iter().enumerate() {
    let payload = json!({ "currency": currency, "tags": ["a", "b"] });
    s.put(statement(&format!("Co{i}"), 2023, payload)).await.unwrap();
  }

  let p = PayloadPredicate::Contains { value: json!({ "currency": "USD", "tags": ["b"] }) };
  let first = s.query_payload(&p, PageRequest::first().with_limit(2)).await.unwrap();
  let names: Vec<_> = first.items.iter().map(|st| st.company.as_str()).collect();
  assert_eq!(names, vec!["Co0", "Co2"]);

  let second = s.query_payload(&p, first.next_request(2).unwrap()).await.unwrap();
  let names: Vec<_> = second.items.iter().map(|st| st.company.as_str()).collect();
  assert_eq!(names, vec!["Co3"]);
  assert!(second.next.is_none());
}

#[tokio::test]
async fn put_if_checks_and_writes_atomically() {
  let s = Arc::new(MemoryStore::new());
  let refused = s
    .put_if(statement("Acme", 2023, json!({ "v": 0 })), |current| current.is_some())
    .await
    .unwrap();
  assert!(refused.is_none());
  assert!(s.is_empty().await);

  s.put(statement("Acme", 2023, json!({ "v": 0 }))).await.unwrap();
  let handles: Vec<_> = (1..=8)
    .map(|i| {
      let s = Arc::clone(&s);
      tokio::spawn(async move {
        s.put_if(statement("Acme", 2023, json!({ "v": i })), |current| {
          current.is_some_and(|c| c.payload.as_value()["v"] == 0)
        })
        .await
      })
    })
    .collect();

  let mut written = 0;
  for h in handles {
    if h.await.unwrap().unwrap().is_some() {
      written += 1;
    }
  }
  assert_eq!(written, 1);
  assert_eq!(s.len().await, 1);
}

#[tokio::test]
async fn wide_predicates_are_answered_or_rejected() {
  let s = MemoryStore::new();
  let wide: serde_json::Map<String, Value> =
    (0..300).map(|i| (format!("f{i}"), json!(i))).collect();
  s.put(statement("Wide", 2023, Value::Object(wide.clone())))
    .await
    .unwrap();

  let p = PayloadPredicate::Contains { value: Value::Object(wide) };
  assert_eq!(companies(&s, &p).await, vec!["Wide"]);

  let eqs: Vec<_> = (0..=MAX_PREDICATE_OPERANDS as i64)
    .map(|i| PayloadPredicate::eq("f1", i).unwrap())
    .collect();
  let err = s
    .query_payload(&PayloadPredicate::Any { of: eqs }, PageRequest::first())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}
