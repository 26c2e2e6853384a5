//! SQLite-backed cache store.
//!
//! Persists cached report payloads across process restarts. Expiry is
//! enforced lazily: expired rows are deleted when read, and callers may run
//! [`SqliteCacheStore::purge_expired`] periodically to reclaim space.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use super::{CacheStore, CacheStoreError};

/// TTL-bounded key-value store on a local SQLite database.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheStoreError::Unavailable(e.to_string()))?;
        }
        let conn = Connection::open(&path)?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, CacheStoreError> {
        let conn = Connection::open_in_memory()?;
        init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default location: `<user cache dir>/informe/cache.db`.
    pub fn default_path() -> Result<PathBuf, CacheStoreError> {
        let base = dirs::cache_dir()
            .ok_or_else(|| CacheStoreError::Unavailable("no cache directory".to_string()))?;
        Ok(base.join("informe").join("cache.db"))
    }

    /// Delete all expired rows; returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, CacheStoreError> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM cache WHERE expires_at <= ?",
            params![unix_now()],
        )?;
        Ok(removed)
    }

    /// Number of live entries.
    pub async fn len(&self) -> Result<usize, CacheStoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache WHERE expires_at > ?",
            params![unix_now()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheStoreError> {
        let conn = self.conn.lock().await;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache WHERE key = ?",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((value, expires_at)) if expires_at > unix_now() => Ok(Some(value)),
            Some(_) => {
                conn.execute("DELETE FROM cache WHERE key = ?", params![key])?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheStoreError> {
        let conn = self.conn.lock().await;
        let expires_at = unix_now() + ttl_seconds as i64;
        conn.execute(
            "INSERT OR REPLACE INTO cache (key, value, expires_at) VALUES (?, ?, ?)",
            params![key, value, expires_at],
        )?;
        Ok(())
    }
}

fn init(conn: &Connection) -> Result<(), CacheStoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
