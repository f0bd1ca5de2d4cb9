use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::coin::Coin;
use crate::domain::value_objects::amount::Amount;

/// One holding: a positive amount of exactly one coin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEntry {
    pub id: i64,
    pub coin_id: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entry joined with its coin, as returned to API callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEntryView {
    pub id: i64,
    pub coin_id: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub coin: Coin,
    pub current_value_usd: Option<BigDecimal>,
}

impl PortfolioEntryView {
    /// Join an entry with its coin. The USD value is computed here, once.
    pub fn new(entry: PortfolioEntry, coin: Coin) -> Self {
        let current_value_usd = coin
            .current_price
            .as_ref()
            .map(|price| entry.amount.value() * price);

        Self {
            id: entry.id,
            coin_id: entry.coin_id,
            amount: entry.amount,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            coin,
            current_value_usd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn coin(price: Option<&str>) -> Coin {
        let now = Utc::now();
        Coin {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            current_price: price.map(|p| BigDecimal::from_str(p).unwrap()),
            price_change_percentage_24h: None,
            market_cap: None,
            market_cap_rank: None,
            circulating_supply: None,
            max_supply: None,
            description: None,
            image_url: None,
            last_updated: now,
            created_at: now,
        }
    }

    fn entry(amount: &str) -> PortfolioEntry {
        let now = Utc::now();
        PortfolioEntry {
            id: 1,
            coin_id: "bitcoin".to_string(),
            amount: Amount::parse(amount).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_view_computes_value() {
        let view = PortfolioEntryView::new(entry("0.5"), coin(Some("50000")));
        assert_eq!(
            view.current_value_usd,
            Some(BigDecimal::from_str("25000").unwrap())
        );
    }

    #[test]
    fn test_view_without_price_has_no_value() {
        let view = PortfolioEntryView::new(entry("2"), coin(None));
        assert_eq!(view.current_value_usd, None);
    }
}
