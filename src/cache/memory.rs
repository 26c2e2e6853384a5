//! In-memory cache store, for tests and single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{CacheStore, CacheStoreError};

/// TTL-aware key-value store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().1 > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        if let Some(entry) = self.entries.get(key) {
            let (value, deadline) = entry.value();
            if *deadline > Instant::now() {
                return Ok(Some(value.clone()));
            }
        }
        // Expired entries are removed on the read path.
        self.entries
            .remove_if(key, |_, (_, deadline)| *deadline <= Instant::now());
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheStoreError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }
}
