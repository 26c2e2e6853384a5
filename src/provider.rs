//! Collaborator traits for the external data sources reports read from.
//!
//! The engine itself never talks to the CRM or the relational store; reports
//! do, through these traits. Both are potentially blocking I/O and carry their
//! own timeout policy. The cache store collaborator lives in [`crate::cache`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::report::Row;

/// Errors surfaced by external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The CRM rejected the request.
    #[error("crm request failed: {0}")]
    CrmRequest(String),

    /// The CRM could not be reached.
    #[error("crm unavailable: {0}")]
    CrmUnavailable(String),

    /// The relational store failed.
    #[error("database query failed: {0}")]
    Database(String),

    /// Report logic failed after fetching.
    #[error("report failed: {0}")]
    Report(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One decoded CRM page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmResponse {
    pub status: u16,
    pub body: Value,
}

impl CrmResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Rows under the body's `data` key; anything else yields an empty list.
    pub fn data(&self) -> Vec<Row> {
        match self.body.get("data") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The body's `meta` mapping, if present.
    pub fn meta(&self) -> serde_json::Map<String, Value> {
        match self.body.get("meta") {
            Some(Value::Object(meta)) => meta.clone(),
            _ => serde_json::Map::new(),
        }
    }

    /// The `links.next` pagination URL, when the CRM has more pages.
    pub fn next_link(&self) -> Option<&str> {
        self.body
            .get("links")
            .and_then(|links| links.get("next"))
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
    }
}

/// Opaque CRM fetcher: takes query parameters, returns one decoded page.
#[async_trait]
pub trait CrmFetcher: Send + Sync {
    async fn fetch(
        &self,
        query: &BTreeMap<String, Value>,
        trace_id: &str,
    ) -> ProviderResult<CrmResponse>;
}

/// Opaque read access to the relational store, handed to report
/// implementations as-is.
#[async_trait]
pub trait DbExecutor: Send + Sync {
    async fn rows(&self, query: &str, trace_id: &str) -> ProviderResult<Vec<Row>>;
}
