//! Shared fixtures for unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::domain::errors::MarketDataError;
use crate::domain::repositories::price_api::PriceApi;
use crate::persistence::{init_database, DbPool};

/// In-memory `PriceApi` answering from scripted payloads
#[derive(Default)]
pub struct ScriptedPriceApi {
    list: Mutex<Option<Value>>,
    coins: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    coin_calls: Mutex<HashMap<String, usize>>,
    coin_delay: Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl ScriptedPriceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_list(&self, list: Value) {
        *self.list.lock().unwrap() = Some(list);
    }

    pub fn set_coin(&self, coin_id: &str, payload: Value) {
        self.coins
            .lock()
            .unwrap()
            .insert(coin_id.to_string(), payload);
    }

    /// Make every detail fetch for `coin_id` fail with a 500
    pub fn fail_coin(&self, coin_id: &str) {
        self.failing.lock().unwrap().insert(coin_id.to_string());
    }

    /// Make every detail fetch take `delay`, like a slow upstream
    pub fn delay_coins(&self, delay: Duration) {
        *self.coin_delay.lock().unwrap() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn coin_calls(&self, coin_id: &str) -> usize {
        self.coin_calls
            .lock()
            .unwrap()
            .get(coin_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceApi for ScriptedPriceApi {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_coins_list(&self) -> Result<Value, MarketDataError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.list
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| MarketDataError::Upstream {
                status: 503,
                message: "no list scripted".to_string(),
            })
    }

    async fn fetch_coin(&self, coin_id: &str) -> Result<Value, MarketDataError> {
        *self
            .coin_calls
            .lock()
            .unwrap()
            .entry(coin_id.to_string())
            .or_insert(0) += 1;

        let delay = *self.coin_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(coin_id) {
            return Err(MarketDataError::Upstream {
                status: 500,
                message: format!("scripted failure for {}", coin_id),
            });
        }

        self.coins
            .lock()
            .unwrap()
            .get(coin_id)
            .cloned()
            .ok_or_else(|| MarketDataError::CoinNotFound(coin_id.to_string()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Upstream-shaped detail document
pub fn coin_payload(coin_id: &str, price: Option<f64>, change_24h: Option<f64>) -> Value {
    json!({
        "id": coin_id,
        "symbol": coin_id.chars().take(3).collect::<String>(),
        "name": coin_id,
        "market_data": {
            "current_price": {"usd": price},
            "price_change_percentage_24h": change_24h,
        },
        "last_updated": "2024-05-01T12:00:00.000Z"
    })
}

pub fn bitcoin_payload() -> Value {
    json!({
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "market_data": {
            "current_price": {"usd": 50000},
            "market_cap": {"usd": 950000000000u64},
            "market_cap_rank": 1,
            "price_change_percentage_24h": 2.0,
            "circulating_supply": 19000000,
            "max_supply": 21000000
        },
        "image": {"large": "https://assets.coingecko.com/coins/images/1/large/bitcoin.png"},
        "description": {"en": "Bitcoin is the first decentralized cryptocurrency."},
        "last_updated": "2024-05-01T12:00:00.000Z"
    })
}

pub async fn memory_pool() -> DbPool {
    init_database("sqlite::memory:").await.unwrap()
}

/// File-backed database in the temp dir, deleted on drop.
///
/// In-memory pools have a single connection, so concurrent writers need a file.
pub struct TempDatabase {
    pub pool: DbPool,
    path: PathBuf,
}

impl TempDatabase {
    pub async fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!(
            "coinfolio-{}-{}-{}-{}.db",
            name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst),
            nanos
        ));
        let pool = init_database(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        Self { pool, path }
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
