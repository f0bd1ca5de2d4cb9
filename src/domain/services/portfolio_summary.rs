//! Portfolio Summary
//!
//! Pure aggregation over the joined portfolio entries: total USD value, number of
//! holdings and the value-weighted 24h change.

use bigdecimal::BigDecimal;
use num_traits::{ToPrimitive, Zero};
use serde::Serialize;
use std::str::FromStr;

use crate::domain::entities::portfolio_entry::PortfolioEntryView;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_value_usd: BigDecimal,
    pub total_coins: usize,
    pub total_24h_change_percentage: Option<f64>,
    pub entries: Vec<PortfolioEntryView>,
}

/// Build the summary for `entries`.
///
/// Unpriced entries count towards `total_coins` but add nothing to the value.
pub fn summarize(entries: Vec<PortfolioEntryView>) -> PortfolioSummary {
    let total_value_usd = entries
        .iter()
        .filter_map(|entry| entry.current_value_usd.as_ref())
        .fold(BigDecimal::zero(), |acc, value| acc + value);

    let total_24h_change_percentage = weighted_change(&entries, &total_value_usd);

    PortfolioSummary {
        total_value_usd,
        total_coins: entries.len(),
        total_24h_change_percentage,
        entries,
    }
}

/// Value-weighted 24h change, rescaled by `total / total_with_known_change`.
///
/// Entries without a price or without a known change are left out of the weights.
fn weighted_change(entries: &[PortfolioEntryView], total: &BigDecimal) -> Option<f64> {
    if entries.is_empty() || *total <= BigDecimal::zero() {
        return None;
    }

    let mut weighted = BigDecimal::zero();
    let mut total_with_changes = BigDecimal::zero();

    for entry in entries {
        let value = match &entry.current_value_usd {
            Some(value) if *value > BigDecimal::zero() => value,
            _ => continue,
        };
        let change = match entry
            .coin
            .price_change_percentage_24h
            .filter(|c| c.is_finite())
            .and_then(|c| BigDecimal::from_str(&c.to_string()).ok())
        {
            Some(change) => change,
            None => continue,
        };

        weighted += change * (value / total);
        total_with_changes += value.clone();
    }

    if total_with_changes <= BigDecimal::zero() {
        return None;
    }

    (weighted * (total / &total_with_changes)).to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::coin::Coin;
    use crate::domain::entities::portfolio_entry::PortfolioEntry;
    use crate::domain::value_objects::amount::Amount;
    use chrono::Utc;

    fn view(id: i64, coin_id: &str, amount: &str, price: Option<&str>, change: Option<f64>) -> PortfolioEntryView {
        let now = Utc::now();
        let coin = Coin {
            id: coin_id.to_string(),
            symbol: coin_id[..3].to_string(),
            name: coin_id.to_string(),
            current_price: price.map(|p| BigDecimal::from_str(p).unwrap()),
            price_change_percentage_24h: change,
            market_cap: None,
            market_cap_rank: None,
            circulating_supply: None,
            max_supply: None,
            description: None,
            image_url: None,
            last_updated: now,
            created_at: now,
        };
        let entry = PortfolioEntry {
            id,
            coin_id: coin_id.to_string(),
            amount: Amount::parse(amount).unwrap(),
            created_at: now,
            updated_at: now,
        };
        PortfolioEntryView::new(entry, coin)
    }

    #[test]
    fn test_summary_weighted_change() {
        let summary = summarize(vec![
            view(1, "bitcoin", "0.5", Some("50000"), Some(2.0)),
            view(2, "ethereum", "5", Some("3000"), Some(3.0)),
        ]);

        assert_eq!(summary.total_value_usd, BigDecimal::from(40000));
        assert_eq!(summary.total_coins, 2);
        let change = summary.total_24h_change_percentage.unwrap();
        assert!((change - 2.375).abs() < 0.01);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(Vec::new());

        assert_eq!(summary.total_value_usd, BigDecimal::zero());
        assert_eq!(summary.total_coins, 0);
        assert_eq!(summary.total_24h_change_percentage, None);
    }

    #[test]
    fn test_unpriced_entry_is_counted_but_adds_no_value() {
        let summary = summarize(vec![
            view(1, "bitcoin", "1", Some("100"), Some(1.0)),
            view(2, "newcoin", "10", None, Some(50.0)),
        ]);

        assert_eq!(summary.total_value_usd, BigDecimal::from(100));
        assert_eq!(summary.total_coins, 2);
        let change = summary.total_24h_change_percentage.unwrap();
        assert!((change - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_known_change_gives_none() {
        let summary = summarize(vec![view(1, "bitcoin", "1", Some("100"), None)]);
        assert_eq!(summary.total_24h_change_percentage, None);
    }

    #[test]
    fn test_partial_change_coverage_is_rescaled() {
        // 60 of 100 USD has a known +10% change: 10 * 0.6 rescaled by 100 / 60.
        let summary = summarize(vec![
            view(1, "bitcoin", "1", Some("60"), Some(10.0)),
            view(2, "ethereum", "1", Some("40"), None),
        ]);

        let change = summary.total_24h_change_percentage.unwrap();
        assert!((change - 10.0).abs() < 1e-9);
    }
}
