use crate::config::Config;
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use utoipa::ToSchema;

/// In-memory store of upstream JSON bodies with a fixed time-to-live.
///
/// Concurrent misses on the same key are not collapsed: each caller fetches
/// and the last insert wins.
pub struct ResponseCache {
    inner: Cache<String, Value>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: u64,
    pub ttl_seconds: u64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_seconds),
            config.cache_max_capacity,
        )
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let value = self.inner.get(key).await;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub async fn insert(&self, key: String, value: Value) {
        self.inner.insert(key, value).await;
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the cached value for `key`, or runs `fetch` and stores its
    /// result. Errors from `fetch` are passed through and nothing is stored.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: String, fetch: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(%key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(%key, "Cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn stats(&self) -> CacheStats {
        // entry_count lags behind until pending maintenance has run
        self.inner.run_pending_tasks().await;

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.inner.entry_count(),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}
