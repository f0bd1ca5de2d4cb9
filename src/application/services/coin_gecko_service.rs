//! Market data access: cache-aside over a rate-limited price API.

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::CoinGeckoConfig;
use crate::domain::entities::coin::{CoinDetail, CoinSummary};
use crate::domain::errors::MarketDataError;
use crate::domain::repositories::cache_store::CacheStore;
use crate::domain::repositories::price_api::PriceApi;
use crate::rate_limit::TokenBucketRateLimiter;

pub const COINS_LIST_CACHE_KEY: &str = "coingecko:coins:list";
pub const COIN_DETAIL_CACHE_PREFIX: &str = "coingecko:coin:";

pub fn coin_detail_cache_key(coin_id: &str) -> String {
    format!("{}{}", COIN_DETAIL_CACHE_PREFIX, coin_id)
}

pub struct CoinGeckoService {
    api: Arc<dyn PriceApi>,
    cache: Arc<dyn CacheStore>,
    limiter: Arc<TokenBucketRateLimiter>,
    list_ttl: Duration,
    detail_ttl: Duration,
}

impl CoinGeckoService {
    pub fn new(
        api: Arc<dyn PriceApi>,
        cache: Arc<dyn CacheStore>,
        limiter: Arc<TokenBucketRateLimiter>,
        list_ttl: Duration,
        detail_ttl: Duration,
    ) -> Self {
        info!(
            provider = api.name(),
            list_ttl_secs = list_ttl.as_secs(),
            detail_ttl_secs = detail_ttl.as_secs(),
            "Market data service initialized"
        );
        Self {
            api,
            cache,
            limiter,
            list_ttl,
            detail_ttl,
        }
    }

    pub fn from_config(
        config: &CoinGeckoConfig,
        api: Arc<dyn PriceApi>,
        cache: Arc<dyn CacheStore>,
        limiter: Arc<TokenBucketRateLimiter>,
    ) -> Self {
        Self::new(api, cache, limiter, config.cache_ttl, config.detail_cache_ttl)
    }

    /// Every coin the provider knows about.
    ///
    /// Entries that fail to parse are logged and dropped; the rest are returned.
    pub async fn get_coins_list(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<CoinSummary>, MarketDataError> {
        if !force_refresh {
            match self.cache.get(COINS_LIST_CACHE_KEY).await?.as_deref() {
                Some(Value::Array(items)) if !items.is_empty() => {
                    debug!(count = items.len(), "Coins list cache hit");
                    return Ok(parse_coins_list(items));
                }
                Some(Value::Array(_)) => debug!("Cached coins list is empty, refetching"),
                Some(_) => {
                    warn!("Cached coins list is not an array, refetching");
                    self.cache.delete(COINS_LIST_CACHE_KEY).await?;
                }
                None => debug!("Coins list cache miss"),
            }
        }

        self.limiter.acquire_one().await?;
        let raw = self.api.fetch_coins_list().await?;
        let items = match raw {
            Value::Array(items) => items,
            other => {
                return Err(MarketDataError::Upstream {
                    status: 200,
                    message: format!("expected a JSON array of coins, got {}", json_kind(&other)),
                })
            }
        };

        let coins = parse_coins_list(&items);
        self.cache
            .set(
                COINS_LIST_CACHE_KEY,
                Value::Array(items),
                Some(self.list_ttl),
            )
            .await?;

        info!(count = coins.len(), "Fetched coins list");
        Ok(coins)
    }

    /// Normalized detail for one coin, served from the short-lived cache when fresh.
    pub async fn get_coin_details(&self, coin_id: &str) -> Result<CoinDetail, MarketDataError> {
        let cache_key = coin_detail_cache_key(coin_id);

        if let Some(cached) = self.cache.get(&cache_key).await? {
            match CoinDetail::deserialize(cached.as_ref()) {
                Ok(detail) => {
                    debug!(coin_id, "Coin detail cache hit");
                    return Ok(detail);
                }
                Err(e) => {
                    warn!("Failed to parse cached coin data for {}: {}", coin_id, e);
                    self.cache.delete(&cache_key).await?;
                }
            }
        }

        self.limiter.acquire_one().await?;
        let payload = self.api.fetch_coin(coin_id).await?;
        let detail = CoinDetail::from_upstream(&payload, Utc::now()).map_err(|e| {
            warn!("Invalid coin data for {}: {}", coin_id, e);
            MarketDataError::from(e)
        })?;

        let record =
            serde_json::to_value(&detail).map_err(|e| MarketDataError::Cache(e.to_string()))?;
        self.cache
            .set(&cache_key, record, Some(self.detail_ttl))
            .await?;

        debug!(coin_id, "Fetched coin detail");
        Ok(detail)
    }

    /// Case-insensitive substring search over coin name and symbol
    pub async fn search_coins(
        &self,
        query: &str,
    ) -> Result<(Vec<CoinSummary>, usize), MarketDataError> {
        let needle = query.to_lowercase();
        let results: Vec<CoinSummary> = self
            .get_coins_list(false)
            .await?
            .into_iter()
            .filter(|coin| coin.matches(&needle))
            .collect();

        let total = results.len();
        debug!(query, total, "Coin search completed");
        Ok((results, total))
    }

    /// Release the transport's HTTP resources
    pub async fn close(&self) {
        self.api.close().await;
    }
}

fn parse_coins_list(items: &[Value]) -> Vec<CoinSummary> {
    items
        .iter()
        .filter_map(|item| match CoinSummary::from_value(item) {
            Ok(coin) => Some(coin),
            Err(e) => {
                warn!("Failed to parse coin data: {}", e);
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
