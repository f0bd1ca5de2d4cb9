//! Price API Trait
//!
//! Transport to the upstream market data provider. Implementations return the raw
//! JSON bodies; normalization and caching happen above this seam.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::MarketDataError;

#[async_trait]
pub trait PriceApi: Send + Sync {
    /// Name of the provider, for logs
    fn name(&self) -> &str;

    /// Raw `[{id, symbol, name}, ...]` list of every known coin
    async fn fetch_coins_list(&self) -> Result<Value, MarketDataError>;

    /// Raw detail document for one coin.
    ///
    /// Returns `MarketDataError::CoinNotFound` when the provider does not know `coin_id`.
    async fn fetch_coin(&self, coin_id: &str) -> Result<Value, MarketDataError>;

    /// Release pooled connections. A later fetch reopens them.
    async fn close(&self);
}
