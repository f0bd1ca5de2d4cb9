//! Coin entities - metadata and market data for one tradable asset
//!
//! Upstream payloads are only partially trusted: missing nested objects become
//! `None`, while present values of the wrong type are rejected.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// One element of the upstream coin list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinSummary {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

impl CoinSummary {
    /// Parse one raw list entry. All three fields must be strings and the id non-empty.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let summary: CoinSummary = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::InvalidCoinData(e.to_string()))?;
        if summary.id.trim().is_empty() {
            return Err(ValidationError::InvalidCoinData("empty coin id".to_string()));
        }
        Ok(summary)
    }

    /// Case-insensitive substring match on name or symbol. `needle` must be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.symbol.to_lowercase().contains(needle)
    }
}

/// Normalized coin detail as returned by the market data layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<BigDecimal>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<BigDecimal>,
    pub market_cap_rank: Option<i64>,
    pub circulating_supply: Option<BigDecimal>,
    pub max_supply: Option<BigDecimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CoinDetail {
    /// Build a detail record from the upstream `coins/{id}` payload.
    pub fn from_upstream(payload: &Value, created_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        if !payload.is_object() {
            return Err(ValidationError::InvalidCoinData(
                "coin payload is not an object".to_string(),
            ));
        }

        let market_data = payload.get("market_data");
        let nested = |outer: &str, inner: &str| -> Option<&Value> {
            market_data
                .and_then(|m| m.get(outer))
                .and_then(|v| v.get(inner))
        };
        let market = |field: &str| market_data.and_then(|m| m.get(field));

        let id = required_string(payload.get("id"), "id")?;
        if id.trim().is_empty() {
            return Err(ValidationError::InvalidCoinData("empty coin id".to_string()));
        }

        Ok(CoinDetail {
            id,
            symbol: required_string(payload.get("symbol"), "symbol")?,
            name: required_string(payload.get("name"), "name")?,
            current_price: decimal_field(nested("current_price", "usd"), "current_price")?,
            price_change_percentage_24h: float_field(
                market("price_change_percentage_24h"),
                "price_change_percentage_24h",
            )?,
            market_cap: decimal_field(nested("market_cap", "usd"), "market_cap")?,
            market_cap_rank: integer_field(market("market_cap_rank"), "market_cap_rank")?,
            circulating_supply: decimal_field(market("circulating_supply"), "circulating_supply")?,
            max_supply: decimal_field(market("max_supply"), "max_supply")?,
            description: optional_string(
                payload.get("description").and_then(|d| d.get("en")),
                "description",
            )?
            .filter(|s| !s.trim().is_empty()),
            image_url: optional_string(payload.get("image").and_then(|i| i.get("large")), "image_url")?,
            last_updated: timestamp_field(payload.get("last_updated"), "last_updated")?,
            created_at,
        })
    }

    pub fn summary(&self) -> CoinSummary {
        CoinSummary {
            id: self.id.clone(),
            symbol: self.symbol.clone(),
            name: self.name.clone(),
        }
    }
}

/// Coin as persisted in the portfolio store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<BigDecimal>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<BigDecimal>,
    pub market_cap_rank: Option<i64>,
    pub circulating_supply: Option<BigDecimal>,
    pub max_supply: Option<BigDecimal>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn invalid(field: &str, expected: &str) -> ValidationError {
    ValidationError::InvalidCoinData(format!("{} must be {}", field, expected))
}

fn required_string(value: Option<&Value>, field: &str) -> Result<String, ValidationError> {
    optional_string(value, field)?.ok_or_else(|| invalid(field, "present"))
}

fn optional_string(value: Option<&Value>, field: &str) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(field, "a string")),
    }
}

fn decimal_field(value: Option<&Value>, field: &str) -> Result<Option<BigDecimal>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map(Some)
            .map_err(|_| invalid(field, "a decimal number")),
        Some(Value::String(s)) => BigDecimal::from_str(s.trim())
            .map(Some)
            .map_err(|_| invalid(field, "a decimal number")),
        Some(_) => Err(invalid(field, "a decimal number")),
    }
}

fn float_field(value: Option<&Value>, field: &str) -> Result<Option<f64>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| invalid(field, "a number")),
        Some(_) => Err(invalid(field, "a number")),
    }
}

fn integer_field(value: Option<&Value>, field: &str) -> Result<Option<i64>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid(field, "an integer")),
        Some(_) => Err(invalid(field, "an integer")),
    }
}

fn timestamp_field(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match optional_string(value, field)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|_| invalid(field, "an RFC 3339 timestamp")),
    }
}
