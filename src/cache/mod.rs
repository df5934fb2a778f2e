//! Cache-aside layer.
//!
//! [`CacheService::get_or_compute`] returns a stored value when one exists and
//! otherwise runs the supplied computation and stores its result. The cache is
//! strictly best-effort: backend failures are logged and behave like a miss, so
//! a broken or absent backend changes latency and upstream call volume only.
//!
//! Concurrent misses for the same key are not coalesced; each caller computes.

pub mod sqlite;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::window::TimeWindow;

pub use sqlite::SqliteCacheBackend;

/// Default time-to-live of cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Key-value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// The live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete every entry whose key matches the glob `pattern`.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError>;
}

/// Build a cache key: `{operation}:{project}:{start}:{end}[:{extra}...]`.
///
/// Window bounds are in canonical form so equivalent windows share a key. A
/// missing window is written as `-:-`.
pub fn cache_key(
    operation: &str,
    project_id: &str,
    window: Option<&TimeWindow>,
    extras: &[&str],
) -> String {
    let (start, end) = match window {
        Some(window) => (window.start_iso(), window.end_iso()),
        None => ("-".to_string(), "-".to_string()),
    };

    let mut key = format!("{operation}:{project_id}:{start}:{end}");
    for extra in extras {
        key.push(':');
        key.push_str(extra);
    }
    key
}

/// Best-effort cache in front of expensive computations.
#[derive(Clone)]
pub struct CacheService {
    backend: Option<Arc<dyn CacheBackend>>,
    ttl: Duration,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend: Some(backend),
            ttl,
        }
    }

    /// A cache that stores nothing; every lookup computes.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// Only `Ok` results are stored. Errors from `compute` are returned as-is.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = self.backend.as_ref() else {
            return compute().await;
        };

        match backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(key, "Cache miss"),
            Err(e) => warn!(key, error = %e, "Cache read failed; computing"),
        }

        let value = compute().await?;
        self.store(backend.as_ref(), key, &value).await;
        Ok(value)
    }

    /// Write a value without reading first. Failures are logged and ignored.
    #[cfg(test)]
    async fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Some(backend) = self.backend.as_ref() {
            self.store(backend.as_ref(), key, value).await;
        }
    }

    /// Delete entries matching a glob pattern; returns the number removed.
    ///
    /// Without a backend this is a no-op returning 0.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let Some(backend) = self.backend.as_ref() else {
            return 0;
        };

        match backend.delete_matching(pattern).await {
            Ok(deleted) => {
                debug!(pattern, deleted, "Cache invalidated");
                deleted
            }
            Err(e) => {
                warn!(pattern, error = %e, "Cache invalidation failed");
                0
            }
        }
    }

    async fn store<T: Serialize>(&self, backend: &dyn CacheBackend, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %CacheError::from(e), "Skipping cache store");
                return;
            }
        };

        if let Err(e) = backend.set(key, &raw, self.ttl).await {
            warn!(key, error = %e, "Cache store failed");
        }
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("enabled", &self.is_enabled())
            .field("ttl", &self.ttl)
            .finish()
    }
}
