//! Time-bounded cache for provider responses.

use cached::{Cached, TimedCache};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key: symbol, operation and serialized parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub operation: String,
    pub params: String,
}

impl CacheKey {
    pub fn new(
        symbol: impl Into<String>,
        operation: impl Into<String>,
        params: impl Serialize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            operation: operation.into(),
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

/// Shared cache of JSON responses with a fixed lifespan.
#[derive(Clone)]
pub struct MarketCache {
    inner: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        // TimedCache evicts on read, so lookups need the write lock
        let mut cache = self.inner.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.inner.write().await;
        cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetch` and cache its result.
    ///
    /// Errors are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetch: F) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!("Cache hit: {} {}", key.operation, key.symbol);
            return Ok(value);
        }

        debug!("Cache miss: {} {}", key.operation, key.symbol);
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.cache_size()
    }
}
