//! In-process TTL cache backing the market data layer, built on moka.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::errors::MarketDataError;
use crate::domain::repositories::cache_store::CacheStore;

/// Upper bound on cached keys (one list plus per-coin details)
const MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Clone)]
struct CachedValue {
    value: Arc<Value>,
    ttl: Option<Duration>,
}

/// Each entry lives for the TTL it was stored with; `None` never expires.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

pub struct MemoryCache {
    entries: Cache<String, CachedValue>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<(), MarketDataError> {
        // A zero TTL would be stale on arrival.
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            self.entries.invalidate(key).await;
            return Ok(());
        }

        self.entries
            .insert(
                key.to_string(),
                CachedValue {
                    value: Arc::new(value),
                    ttl,
                },
            )
            .await;
        debug!(key, ttl_secs = ttl.map(|t| t.as_secs()), "Cache entry stored");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Value>>, MarketDataError> {
        Ok(self.entries.get(key).await.map(|cached| cached.value))
    }

    async fn delete(&self, key: &str) -> Result<(), MarketDataError> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, MarketDataError> {
        Ok(self.entries.contains_key(key))
    }
}
