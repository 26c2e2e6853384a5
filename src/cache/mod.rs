//! Result caching: key derivation, TTL negotiation, and store access.
//!
//! The cache is an optimization, never a correctness dependency: store
//! failures are logged and swallowed, and a run proceeds as if it had missed.
//!
//! # Key Format
//!
//! ```text
//! {prefix}{report_key}:{sha256(cache-relevant subset)}
//! ```
//!
//! The cache-relevant subset is the sorted serialization of all resolved
//! parameters plus the control values, excluding the trace id — and excluding
//! `page`/`per_page` when the full result set is fetched, since paging is
//! meaningless there.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::query::NormalizedQuery;
use crate::report::{ColumnSpec, ReportResult, Row};

/// Engine-wide TTL fallback, in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 900;

/// Default cache key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "informe:report:";

/// Errors surfaced by a cache store. Always swallowed by the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Opaque get/set-with-TTL key-value collaborator.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheStoreError>;
}

/// Serialized report payload stored under a cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<Row>,
    pub summary: serde_json::Map<String, Value>,
    pub meta: serde_json::Map<String, Value>,
    pub columns: Vec<ColumnSpec>,
}

impl CacheEntry {
    pub fn from_result(result: &ReportResult) -> Self {
        Self {
            data: result.data.clone(),
            summary: result.summary.clone(),
            meta: result.meta.clone(),
            columns: result.columns.clone(),
        }
    }

    pub fn into_result(self) -> ReportResult {
        ReportResult::new(self.data, self.summary, self.meta, self.columns)
    }
}

/// The subset of a normalized query that participates in key computation.
pub fn cache_relevant_subset(query: &NormalizedQuery) -> BTreeMap<String, Value> {
    let mut subset = query.params.clone();
    if !query.fetch.is_all() {
        subset.insert("page".into(), Value::from(query.page));
        subset.insert("per_page".into(), Value::from(query.per_page));
    }
    if let Some(sort) = &query.sort {
        subset.insert("sort".into(), Value::String(sort.clone()));
    }
    subset.insert("dir".into(), Value::String(query.dir.as_str().to_string()));
    subset.insert(
        "fetch".into(),
        Value::String(query.fetch.as_str().to_string()),
    );
    subset
}

/// Coordinates key derivation, TTL resolution and store access.
pub struct CacheCoordinator {
    store: Option<Arc<dyn CacheStore>>,
    prefix: String,
    default_ttl: u64,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>, default_ttl: u64) -> Self {
        Self {
            store: Some(store),
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// Coordinator with no backing store; every lookup misses and every write
    /// is a no-op.
    pub fn disabled() -> Self {
        Self {
            store: None,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL_SECONDS,
        }
    }

    /// Deterministic key for a report run: prefix, report key, then a sha256
    /// digest of the subset's canonical JSON. The subset is a sorted map, so
    /// the digest is independent of how the raw input was ordered.
    pub fn compute_key(&self, report_key: &str, query: &NormalizedQuery) -> String {
        let subset = cache_relevant_subset(query);
        // A map of JSON values always serializes.
        let json = serde_json::to_string(&subset).unwrap_or_default();
        let digest = Sha256::digest(json.as_bytes());
        format!("{}{}:{:x}", self.prefix, report_key, digest)
    }

    /// TTL precedence: per-call override, then report-declared, then the
    /// engine default. Zero or negative disables caching for the call.
    pub fn resolve_ttl(&self, override_ttl: Option<i64>, declared: Option<u64>) -> u64 {
        match override_ttl {
            Some(ttl) => ttl.max(0) as u64,
            None => declared.unwrap_or(self.default_ttl),
        }
    }

    /// Whether this call should touch the store at all.
    pub fn should_use(&self, cache_enabled: bool, ttl: u64) -> bool {
        self.store.is_some() && cache_enabled && ttl > 0
    }

    /// Best-effort read. Store and decode failures count as misses.
    pub async fn read(&self, key: &str) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;
        let raw = match store.get(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(key, %error, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(key, %error, "cache entry corrupt; treating as miss");
                None
            }
        }
    }

    /// Best-effort write.
    pub async fn write(&self, key: &str, entry: &CacheEntry, ttl_seconds: u64) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let payload = match serde_json::to_string(entry) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(key, %error, "cache entry not serializable; skipping write");
                return;
            }
        };
        if let Err(error) = store.set_with_ttl(key, &payload, ttl_seconds).await {
            tracing::warn!(key, %error, "cache write failed; ignoring");
        }
    }
}
