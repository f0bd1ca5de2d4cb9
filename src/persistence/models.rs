//! Database Models
//!
//! Rows as sqlx decodes them. Decimal columns arrive as text and are parsed into
//! domain types by the `TryFrom` conversions below.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

use super::DatabaseError;
use crate::domain::entities::coin::Coin;
use crate::domain::entities::portfolio_entry::{PortfolioEntry, PortfolioEntryView};
use crate::domain::value_objects::amount::Amount;

/// Coin record in database
#[derive(Debug, Clone, FromRow)]
pub struct CoinRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<String>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: Option<String>,
    pub market_cap_rank: Option<i64>,
    pub circulating_supply: Option<String>,
    pub max_supply: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Portfolio entry record in database
#[derive(Debug, Clone, FromRow)]
pub struct PortfolioEntryRecord {
    pub id: i64,
    pub coin_id: String,
    pub amount: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Portfolio entry joined with its coin
#[derive(Debug, Clone, FromRow)]
pub struct PortfolioEntryWithCoinRecord {
    #[sqlx(flatten)]
    pub entry: PortfolioEntryRecord,
    pub coin_symbol: String,
    pub coin_name: String,
    pub coin_current_price: Option<String>,
    pub coin_price_change_percentage_24h: Option<f64>,
    pub coin_market_cap: Option<String>,
    pub coin_market_cap_rank: Option<i64>,
    pub coin_circulating_supply: Option<String>,
    pub coin_max_supply: Option<String>,
    pub coin_description: Option<String>,
    pub coin_image_url: Option<String>,
    pub coin_last_updated: DateTime<Utc>,
    pub coin_created_at: DateTime<Utc>,
}

fn decimal_column(column: &str, raw: Option<String>) -> Result<Option<BigDecimal>, DatabaseError> {
    raw.map(|text| {
        BigDecimal::from_str(&text)
            .map_err(|_| DatabaseError::Corrupt(format!("{} = {:?}", column, text)))
    })
    .transpose()
}

impl TryFrom<CoinRecord> for Coin {
    type Error = DatabaseError;

    fn try_from(record: CoinRecord) -> Result<Self, Self::Error> {
        Ok(Coin {
            current_price: decimal_column("current_price", record.current_price)?,
            market_cap: decimal_column("market_cap", record.market_cap)?,
            circulating_supply: decimal_column("circulating_supply", record.circulating_supply)?,
            max_supply: decimal_column("max_supply", record.max_supply)?,
            id: record.id,
            symbol: record.symbol,
            name: record.name,
            price_change_percentage_24h: record.price_change_percentage_24h,
            market_cap_rank: record.market_cap_rank,
            description: record.description,
            image_url: record.image_url,
            last_updated: record.last_updated,
            created_at: record.created_at,
        })
    }
}

impl TryFrom<PortfolioEntryRecord> for PortfolioEntry {
    type Error = DatabaseError;

    fn try_from(record: PortfolioEntryRecord) -> Result<Self, Self::Error> {
        let amount = Amount::parse(&record.amount).map_err(|e| {
            DatabaseError::Corrupt(format!("amount of entry {}: {}", record.id, e))
        })?;

        Ok(PortfolioEntry {
            id: record.id,
            coin_id: record.coin_id,
            amount,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl TryFrom<PortfolioEntryWithCoinRecord> for PortfolioEntryView {
    type Error = DatabaseError;

    fn try_from(record: PortfolioEntryWithCoinRecord) -> Result<Self, Self::Error> {
        let coin = Coin::try_from(CoinRecord {
            id: record.entry.coin_id.clone(),
            symbol: record.coin_symbol,
            name: record.coin_name,
            current_price: record.coin_current_price,
            price_change_percentage_24h: record.coin_price_change_percentage_24h,
            market_cap: record.coin_market_cap,
            market_cap_rank: record.coin_market_cap_rank,
            circulating_supply: record.coin_circulating_supply,
            max_supply: record.coin_max_supply,
            description: record.coin_description,
            image_url: record.coin_image_url,
            last_updated: record.coin_last_updated,
            created_at: record.coin_created_at,
        })?;
        let entry = PortfolioEntry::try_from(record.entry)?;

        Ok(PortfolioEntryView::new(entry, coin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin_record(price: Option<&str>) -> CoinRecord {
        let now = Utc::now();
        CoinRecord {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            current_price: price.map(str::to_string),
            price_change_percentage_24h: Some(1.5),
            market_cap: None,
            market_cap_rank: Some(1),
            circulating_supply: None,
            max_supply: None,
            description: None,
            image_url: None,
            last_updated: now,
            created_at: now,
        }
    }

    #[test]
    fn test_coin_record_converts() {
        let coin = Coin::try_from(coin_record(Some("50000.25"))).unwrap();
        assert_eq!(
            coin.current_price,
            Some(BigDecimal::from_str("50000.25").unwrap())
        );
    }

    #[test]
    fn test_corrupt_decimal_is_reported() {
        let result = Coin::try_from(coin_record(Some("fifty")));
        assert!(matches!(result, Err(DatabaseError::Corrupt(_))));
    }

    #[test]
    fn test_non_positive_stored_amount_is_corrupt() {
        let now = Utc::now();
        let record = PortfolioEntryRecord {
            id: 7,
            coin_id: "bitcoin".to_string(),
            amount: "0".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            PortfolioEntry::try_from(record),
            Err(DatabaseError::Corrupt(_))
        ));
    }
}
