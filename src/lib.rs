//! Coinfolio
//!
//! Cryptocurrency portfolio tracker: cached, rate-limited market data from CoinGecko,
//! holdings persisted in SQLite, and a JSON API over both.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;

#[cfg(test)]
mod test_support;
