//! Shared test doubles for the engine's collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use informe::provider::{CrmFetcher, CrmResponse, DbExecutor, ProviderError, ProviderResult};
use informe::report::Row;

/// CRM double that replays a canned body and records every call.
pub struct MockCrm {
    body: Value,
    calls: AtomicUsize,
    queries: Mutex<Vec<BTreeMap<String, Value>>>,
    fail: bool,
}

impl MockCrm {
    pub fn with_body(body: Value) -> Self {
        Self {
            body,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// CRM whose single page carries the given data rows.
    pub fn with_data(rows: Value) -> Self {
        Self::with_body(json!({ "data": rows }))
    }

    pub fn failing() -> Self {
        Self {
            body: Value::Null,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Query map captured for the nth call.
    pub fn query(&self, n: usize) -> BTreeMap<String, Value> {
        self.queries.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl CrmFetcher for MockCrm {
    async fn fetch(
        &self,
        query: &BTreeMap<String, Value>,
        _trace_id: &str,
    ) -> ProviderResult<CrmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(ProviderError::CrmUnavailable("connection refused".into()));
        }
        Ok(CrmResponse::new(200, self.body.clone()))
    }
}

/// Relational store double returning a fixed row set.
pub struct MockDb {
    rows: Vec<Row>,
    calls: AtomicUsize,
}

impl MockDb {
    pub fn empty() -> Self {
        Self::with_rows(Vec::new())
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DbExecutor for MockDb {
    async fn rows(&self, _query: &str, _trace_id: &str) -> ProviderResult<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Build a raw request map from string pairs.
pub fn raw_input(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
