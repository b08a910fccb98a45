//! Read-through response cache.
//!
//! [`AnalyticsCache`] sits in front of a pluggable [`CacheStore`]. Values are
//! stored as JSON so any serialisable report or admin payload can be cached.
//! There is no single-flight: concurrent misses on one key may each run the
//! computation, and the last write wins.

use crate::error::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default lifetime of cached responses (24 hours).
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Key-value store backing the cache.
pub trait CacheStore: Send + Sync {
    /// Returns the stored value, or `None` on a miss or an expired entry.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Removes one entry; returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Instant,
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Store("cache lock poisoned".to_string())
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let now = Instant::now();
        // reads skip expired entries, writes drop them
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

/// Read-through cache with a per-client key namespace.
pub struct AnalyticsCache {
    store: Arc<dyn CacheStore>,
    namespace: String,
    lifetime_secs: AtomicU64,
    enabled: AtomicBool,
}

impl std::fmt::Debug for AnalyticsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsCache")
            .field("namespace", &self.namespace)
            .field("lifetime", &self.lifetime())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AnalyticsCache {
    /// Creates a cache writing keys as `{namespace}.{key}`.
    pub fn new(
        store: Arc<dyn CacheStore>,
        namespace: impl Into<String>,
        lifetime: Duration,
        enabled: bool,
    ) -> Self {
        AnalyticsCache {
            store,
            namespace: namespace.into(),
            lifetime_secs: AtomicU64::new(lifetime.as_secs()),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// In-memory cache, handy for tests and one-off scripts.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(
            Arc::new(InMemoryCacheStore::new()),
            namespace,
            DEFAULT_LIFETIME,
            true,
        )
    }

    /// Cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(InMemoryCacheStore::new()),
            "disabled",
            DEFAULT_LIFETIME,
            false,
        )
    }

    fn full_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.namespace, key)
        }
    }

    /// Returns the cached value for `key`, or runs `compute` and stores its
    /// result.
    ///
    /// Only successful results are stored. Store failures are logged and
    /// treated as misses; they never fail the call.
    pub async fn get<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.is_enabled() {
            return compute().await;
        }

        let full_key = self.full_key(key);
        match self.store.get(&full_key) {
            Ok(Some(stored)) => match serde_json::from_value::<T>(stored) {
                Ok(value) => {
                    debug!(key = %full_key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %full_key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(key = %full_key, "Cache miss"),
            Err(e) => warn!(key = %full_key, error = %e, "Cache lookup failed"),
        }

        let value = compute().await?;

        match serde_json::to_value(&value) {
            Ok(encoded) => {
                if let Err(e) = self.store.set(&full_key, encoded, self.lifetime()) {
                    warn!(key = %full_key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key = %full_key, error = %e, "Cache value not serializable"),
        }

        Ok(value)
    }

    /// Removes one entry from this cache's namespace.
    pub fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(&self.full_key(key))
    }

    /// Clears the backing store. The store may be shared by several clients.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.clear()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_lifetime(&self, lifetime: Duration) {
        self.lifetime_secs.store(lifetime.as_secs(), Ordering::Relaxed);
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs.load(Ordering::Relaxed))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}
