//! Database Repository
//!
//! Data access for coins and portfolio entries. Every function takes a bare
//! connection so it runs inside whatever transaction or save-point the caller holds.

use bigdecimal::BigDecimal;
use chrono::Utc;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, error};

use super::models::*;
use super::DatabaseError;
use crate::domain::entities::coin::{Coin, CoinDetail};
use crate::domain::entities::portfolio_entry::{PortfolioEntry, PortfolioEntryView};
use crate::domain::value_objects::amount::Amount;

const ENTRY_WITH_COIN_SELECT: &str = r#"
    SELECT
        e.id, e.coin_id, e.amount, e.created_at, e.updated_at,
        c.symbol AS coin_symbol,
        c.name AS coin_name,
        c.current_price AS coin_current_price,
        c.price_change_percentage_24h AS coin_price_change_percentage_24h,
        c.market_cap AS coin_market_cap,
        c.market_cap_rank AS coin_market_cap_rank,
        c.circulating_supply AS coin_circulating_supply,
        c.max_supply AS coin_max_supply,
        c.description AS coin_description,
        c.image_url AS coin_image_url,
        c.last_updated AS coin_last_updated,
        c.created_at AS coin_created_at
    FROM portfolio_entries e
    JOIN coins c ON c.id = e.coin_id
"#;

fn decimal_text(value: &Option<BigDecimal>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

/// Portfolio repository
pub struct PortfolioRepository;

impl PortfolioRepository {
    /// Get coin by upstream id
    pub async fn get_coin(
        conn: &mut SqliteConnection,
        coin_id: &str,
    ) -> Result<Option<Coin>, DatabaseError> {
        let record = sqlx::query_as::<_, CoinRecord>("SELECT * FROM coins WHERE id = ?1")
            .bind(coin_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to get coin {}: {}", coin_id, e);
                DatabaseError::QueryError(format!("Failed to get coin: {}", e))
            })?;

        record.map(Coin::try_from).transpose()
    }

    /// Insert a coin from a normalized detail record.
    ///
    /// `None` when the coin is already stored; the stored record is left untouched.
    pub async fn create_coin(
        conn: &mut SqliteConnection,
        detail: &CoinDetail,
    ) -> Result<Option<Coin>, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, CoinRecord>(
            r#"
            INSERT INTO coins (
                id, symbol, name, current_price, price_change_percentage_24h,
                market_cap, market_cap_rank, circulating_supply, max_supply,
                description, image_url, last_updated, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&detail.id)
        .bind(&detail.symbol)
        .bind(&detail.name)
        .bind(decimal_text(&detail.current_price))
        .bind(detail.price_change_percentage_24h)
        .bind(decimal_text(&detail.market_cap))
        .bind(detail.market_cap_rank)
        .bind(decimal_text(&detail.circulating_supply))
        .bind(decimal_text(&detail.max_supply))
        .bind(&detail.description)
        .bind(&detail.image_url)
        .bind(detail.last_updated.unwrap_or(now))
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to create coin {}: {}", detail.id, e);
            DatabaseError::QueryError(format!("Failed to create coin: {}", e))
        })?;

        match record {
            Some(record) => {
                debug!("Created coin: {} ({})", record.name, record.symbol);
                Coin::try_from(record).map(Some)
            }
            None => {
                debug!("Coin {} already stored", detail.id);
                Ok(None)
            }
        }
    }

    /// Overwrite a coin's price. A `None` change keeps the stored one.
    pub async fn update_coin_price(
        conn: &mut SqliteConnection,
        coin_id: &str,
        price: &BigDecimal,
        change_24h: Option<f64>,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE coins
            SET current_price = ?1,
                price_change_percentage_24h = COALESCE(?2, price_change_percentage_24h),
                last_updated = ?3
            WHERE id = ?4
            "#,
        )
        .bind(price.to_string())
        .bind(change_24h)
        .bind(Utc::now())
        .bind(coin_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to update price of {}: {}", coin_id, e);
            DatabaseError::QueryError(format!("Failed to update coin price: {}", e))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Delete a coin. Its portfolio entry goes with it.
    pub async fn delete_coin(
        conn: &mut SqliteConnection,
        coin_id: &str,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM coins WHERE id = ?1")
            .bind(coin_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to delete coin {}: {}", coin_id, e);
                DatabaseError::QueryError(format!("Failed to delete coin: {}", e))
            })?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Coins that currently have a portfolio entry
    pub async fn get_portfolio_coins(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Coin>, DatabaseError> {
        let records = sqlx::query_as::<_, CoinRecord>(
            r#"
            SELECT c.* FROM coins c
            JOIN portfolio_entries e ON e.coin_id = c.id
            ORDER BY e.created_at, e.id
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to get portfolio coins: {}", e);
            DatabaseError::QueryError(format!("Failed to get portfolio coins: {}", e))
        })?;

        records.into_iter().map(Coin::try_from).collect()
    }

    pub async fn get_portfolio_coin_ids(
        conn: &mut SqliteConnection,
    ) -> Result<HashSet<String>, DatabaseError> {
        let ids: Vec<(String,)> = sqlx::query_as("SELECT coin_id FROM portfolio_entries")
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to get portfolio coin ids: {}", e);
                DatabaseError::QueryError(format!("Failed to get portfolio coin ids: {}", e))
            })?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// All entries joined with their coins, oldest first
    pub async fn get_all_entries(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<PortfolioEntryView>, DatabaseError> {
        let query = format!("{} ORDER BY e.created_at, e.id", ENTRY_WITH_COIN_SELECT);
        let records = sqlx::query_as::<_, PortfolioEntryWithCoinRecord>(&query)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to get portfolio entries: {}", e);
                DatabaseError::QueryError(format!("Failed to get portfolio entries: {}", e))
            })?;

        records.into_iter().map(PortfolioEntryView::try_from).collect()
    }

    /// Get entry by ID, joined with its coin
    pub async fn get_entry_by_id(
        conn: &mut SqliteConnection,
        entry_id: i64,
    ) -> Result<Option<PortfolioEntryView>, DatabaseError> {
        let query = format!("{} WHERE e.id = ?1", ENTRY_WITH_COIN_SELECT);
        let record = sqlx::query_as::<_, PortfolioEntryWithCoinRecord>(&query)
            .bind(entry_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to get portfolio entry {}: {}", entry_id, e);
                DatabaseError::QueryError(format!("Failed to get portfolio entry: {}", e))
            })?;

        record.map(PortfolioEntryView::try_from).transpose()
    }

    /// Get entry for a coin, joined with the coin
    pub async fn get_entry_view_by_coin_id(
        conn: &mut SqliteConnection,
        coin_id: &str,
    ) -> Result<Option<PortfolioEntryView>, DatabaseError> {
        let query = format!("{} WHERE e.coin_id = ?1", ENTRY_WITH_COIN_SELECT);
        let record = sqlx::query_as::<_, PortfolioEntryWithCoinRecord>(&query)
            .bind(coin_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to get portfolio entry for {}: {}", coin_id, e);
                DatabaseError::QueryError(format!("Failed to get portfolio entry: {}", e))
            })?;

        record.map(PortfolioEntryView::try_from).transpose()
    }

    pub async fn get_entry_by_coin_id(
        conn: &mut SqliteConnection,
        coin_id: &str,
    ) -> Result<Option<PortfolioEntry>, DatabaseError> {
        let record = sqlx::query_as::<_, PortfolioEntryRecord>(
            "SELECT * FROM portfolio_entries WHERE coin_id = ?1",
        )
        .bind(coin_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to get portfolio entry for {}: {}", coin_id, e);
            DatabaseError::QueryError(format!("Failed to get portfolio entry: {}", e))
        })?;

        record.map(PortfolioEntry::try_from).transpose()
    }

    /// Create a new portfolio entry
    pub async fn create_entry(
        conn: &mut SqliteConnection,
        coin_id: &str,
        amount: &Amount,
    ) -> Result<PortfolioEntry, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, PortfolioEntryRecord>(
            r#"
            INSERT INTO portfolio_entries (coin_id, amount, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING *
            "#,
        )
        .bind(coin_id)
        .bind(amount.to_string())
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to create portfolio entry for {}: {}", coin_id, e);
            DatabaseError::QueryError(format!("Failed to create portfolio entry: {}", e))
        })?;

        debug!("Created portfolio entry {} for {}", record.id, record.coin_id);
        PortfolioEntry::try_from(record)
    }

    /// Replace an entry's amount and bump `updated_at`
    pub async fn update_entry_amount(
        conn: &mut SqliteConnection,
        entry_id: i64,
        amount: &Amount,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query(
            "UPDATE portfolio_entries SET amount = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(amount.to_string())
        .bind(Utc::now())
        .bind(entry_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            error!("Failed to update portfolio entry {}: {}", entry_id, e);
            DatabaseError::QueryError(format!("Failed to update portfolio entry: {}", e))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    pub async fn delete_entry(
        conn: &mut SqliteConnection,
        entry_id: i64,
    ) -> Result<bool, DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM portfolio_entries WHERE id = ?1")
            .bind(entry_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to delete portfolio entry {}: {}", entry_id, e);
                DatabaseError::QueryError(format!("Failed to delete portfolio entry: {}", e))
            })?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
