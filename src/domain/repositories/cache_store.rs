//! Cache Store Trait
//!
//! Key/value store with optional per-key TTL. Values are JSON documents; the
//! caller decides the record shape.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::MarketDataError;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store `value` under `key`. `None` keeps the value until deleted.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>)
        -> Result<(), MarketDataError>;

    /// Fetch a live value, shared with the cache. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<Arc<Value>>, MarketDataError>;

    async fn delete(&self, key: &str) -> Result<(), MarketDataError>;

    async fn exists(&self, key: &str) -> Result<bool, MarketDataError>;
}
