//! Portfolio mutations
//!
//! Every operation runs inside the caller's [`DbSession`]; each unit of work gets its
//! own save-point so a failure rolls back only that unit. Upstream fetches happen
//! before an operation's first write, so no write lock is held across them.

use bigdecimal::BigDecimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::services::coin_gecko_service::CoinGeckoService;
use crate::domain::entities::portfolio_entry::PortfolioEntryView;
use crate::domain::errors::PortfolioError;
use crate::domain::services::portfolio_summary::{summarize, PortfolioSummary};
use crate::domain::value_objects::amount::Amount;
use crate::persistence::repository::PortfolioRepository;
use crate::persistence::session::DbSession;

pub struct PortfolioService {
    market_data: Arc<CoinGeckoService>,
}

impl PortfolioService {
    pub fn new(market_data: Arc<CoinGeckoService>) -> Self {
        Self { market_data }
    }

    pub async fn get_portfolio_entries(
        &self,
        session: &mut DbSession,
    ) -> Result<Vec<PortfolioEntryView>, PortfolioError> {
        let entries = PortfolioRepository::get_all_entries(&mut *session.conn().await?).await?;
        debug!("Retrieved {} portfolio entries", entries.len());
        Ok(entries)
    }

    pub async fn get_portfolio_entry(
        &self,
        session: &mut DbSession,
        entry_id: i64,
    ) -> Result<Option<PortfolioEntryView>, PortfolioError> {
        let entry = PortfolioRepository::get_entry_by_id(&mut *session.conn().await?, entry_id).await?;
        Ok(entry)
    }

    /// Ids of every coin currently held
    pub async fn get_portfolio_coin_ids(
        &self,
        session: &mut DbSession,
    ) -> Result<HashSet<String>, PortfolioError> {
        let ids = PortfolioRepository::get_portfolio_coin_ids(&mut *session.conn().await?).await?;
        Ok(ids)
    }

    pub async fn get_portfolio_summary(
        &self,
        session: &mut DbSession,
    ) -> Result<PortfolioSummary, PortfolioError> {
        let entries = self.get_portfolio_entries(session).await?;
        let summary = summarize(entries);
        info!(
            "Portfolio total value: {} USD with {} coins",
            summary.total_value_usd, summary.total_coins
        );
        Ok(summary)
    }

    /// Add `amount` of `coin_id`, creating the coin record and the entry as needed.
    ///
    /// Adding a coin already held increases its amount.
    pub async fn add_coin_to_portfolio(
        &self,
        session: &mut DbSession,
        coin_id: &str,
        amount: &Amount,
    ) -> Result<PortfolioEntryView, PortfolioError> {
        info!("Adding coin {} to portfolio with amount {}", coin_id, amount);

        // Fetch details for a coin not stored yet, before anything is written.
        let stored = PortfolioRepository::get_coin(&mut *session.conn().await?, coin_id).await?;
        let detail = match stored {
            Some(_) => None,
            None => {
                debug!("Coin {} not stored yet, fetching details", coin_id);
                Some(self.market_data.get_coin_details(coin_id).await?)
            }
        };

        // Make sure the coin exists locally. A concurrent add may have stored it.
        if let Some(detail) = detail {
            let mut savepoint = session.begin_nested().await?;
            if let Some(coin) = PortfolioRepository::create_coin(&mut savepoint, &detail).await? {
                debug!("Created coin record for {} ({})", coin.name, coin.symbol);
            }
            savepoint.commit().await?;
        }

        // Merge into the existing entry or create one.
        {
            let mut savepoint = session.begin_nested().await?;
            match PortfolioRepository::get_entry_by_coin_id(&mut savepoint, coin_id).await? {
                Some(existing) => {
                    let total = existing.amount.add(amount);
                    PortfolioRepository::update_entry_amount(&mut savepoint, existing.id, &total)
                        .await?;
                    info!(
                        "Updated portfolio entry {}: {} -> {}",
                        existing.id, existing.amount, total
                    );
                }
                None => {
                    let entry =
                        PortfolioRepository::create_entry(&mut savepoint, coin_id, amount).await?;
                    info!("Created portfolio entry {} for {}", entry.id, coin_id);
                }
            }
            savepoint.commit().await?;
        }

        let view =
            PortfolioRepository::get_entry_view_by_coin_id(&mut *session.conn().await?, coin_id)
                .await?;
        view.ok_or_else(|| PortfolioError::EntryVanished(coin_id.to_string()))
    }

    /// Replace an entry's amount. `None` when the entry does not exist.
    pub async fn update_portfolio_entry(
        &self,
        session: &mut DbSession,
        entry_id: i64,
        amount: &Amount,
    ) -> Result<Option<PortfolioEntryView>, PortfolioError> {
        info!("Updating portfolio entry {} with amount {}", entry_id, amount);

        {
            let mut savepoint = session.begin_nested().await?;
            if !PortfolioRepository::update_entry_amount(&mut savepoint, entry_id, amount).await? {
                warn!("Portfolio entry {} not found", entry_id);
                return Ok(None);
            }
            savepoint.commit().await?;
        }

        let entry = PortfolioRepository::get_entry_by_id(&mut *session.conn().await?, entry_id).await?;
        Ok(entry)
    }

    /// Delete an entry. `false` when it does not exist.
    pub async fn remove_portfolio_entry(
        &self,
        session: &mut DbSession,
        entry_id: i64,
    ) -> Result<bool, PortfolioError> {
        info!("Removing portfolio entry {}", entry_id);

        let mut savepoint = session.begin_nested().await?;
        if !PortfolioRepository::delete_entry(&mut savepoint, entry_id).await? {
            warn!("Portfolio entry {} not found for removal", entry_id);
            return Ok(false);
        }
        savepoint.commit().await?;

        info!("Portfolio entry {} removed successfully", entry_id);
        Ok(true)
    }

    /// Refresh the stored price of every held coin.
    ///
    /// A coin whose fetch or update fails is logged and skipped. Returns how many
    /// coins were updated.
    pub async fn refresh_coin_prices(&self, session: &mut DbSession) -> Result<usize, PortfolioError> {
        info!("Refreshing coin prices");

        let coins = PortfolioRepository::get_portfolio_coins(&mut *session.conn().await?).await?;
        info!("Found {} coins in portfolio to refresh", coins.len());

        // Fetch every price first so the writes below run back to back.
        let mut prices = Vec::with_capacity(coins.len());
        for coin in coins {
            let detail = match self.market_data.get_coin_details(&coin.id).await {
                Ok(detail) => detail,
                Err(e) => {
                    error!("Error updating price for {}: {}", coin.id, e);
                    continue;
                }
            };

            match detail.current_price {
                Some(price) => prices.push((coin, price, detail.price_change_percentage_24h)),
                None => warn!("No price data available for {}", coin.id),
            }
        }

        let mut updated = 0;
        for (coin, price, change_24h) in prices {
            match self.store_price(session, &coin.id, &price, change_24h).await {
                Ok(()) => {
                    updated += 1;
                    debug!(
                        "Updated price for {}: {:?} -> {} USD",
                        coin.id, coin.current_price, price
                    );
                }
                Err(e) => error!("Error updating price for {}: {}", coin.id, e),
            }
        }

        info!("Updated prices for {} coins", updated);
        Ok(updated)
    }

    async fn store_price(
        &self,
        session: &mut DbSession,
        coin_id: &str,
        price: &BigDecimal,
        change_24h: Option<f64>,
    ) -> Result<(), PortfolioError> {
        let mut savepoint = session.begin_nested().await?;
        PortfolioRepository::update_coin_price(&mut savepoint, coin_id, price, change_24h).await?;
        savepoint.commit().await?;
        Ok(())
    }
}
