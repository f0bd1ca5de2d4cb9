use thiserror::Error;

use crate::persistence::DatabaseError;
use crate::rate_limit::RateLimitError;

/// Caller-supplied or upstream data that does not fit the domain model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Amount must be greater than 0")]
    NonPositiveAmount,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid coin data: {0}")]
    InvalidCoinData(String),
}

/// Failures of the external market data layer
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Coin not found: {0}")]
    CoinNotFound(String),

    #[error("Invalid data from API: {0}")]
    Validation(#[from] ValidationError),

    #[error("Market data request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Market data API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Rate limiter rejected request: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid market data URL: {0}")]
    InvalidUrl(String),
}

/// Failures of the portfolio mutation protocol
///
/// "Not found" is not an error here: lookups return `Option` / `bool`.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Portfolio entry for {0} disappeared after commit")]
    EntryVanished(String),
}

impl From<sqlx::Error> for PortfolioError {
    fn from(e: sqlx::Error) -> Self {
        PortfolioError::Database(DatabaseError::ConnectionError(e))
    }
}
