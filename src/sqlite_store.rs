use crate::cache::CacheStore;
use crate::error::CacheError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// SQLite-backed cache store.
///
/// Entries survive process restarts, so a CLI run can reuse reports fetched
/// by an earlier run. The schema is created on first use.
#[derive(Debug)]
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Opens (or creates) a file-based cache database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        let store = SqliteCacheStore {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// In-memory database. Useful for testing.
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteCacheStore {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().map_err(|_| {
            rusqlite::Error::InvalidParameterName("cache connection poisoned".to_string())
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at)",
            [],
        )?;
        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Store("cache connection poisoned".to_string()))
    }

    /// Deletes expired rows; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            [Utc::now().timestamp()],
        )?;
        Ok(removed)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let conn = self.connection()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, Utc::now().timestamp()],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(&value)?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);

        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, encoded, expires_at],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let conn = self.connection()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }
}
