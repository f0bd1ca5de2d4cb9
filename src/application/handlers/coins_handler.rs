use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{finish, ApiError, ApiResult};
use crate::application::router::AppState;
use crate::domain::entities::coin::{CoinDetail, CoinSummary};
use crate::persistence::session::DbSession;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

/// Query parameters for the coin list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListCoinsQuery {
    pub search: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

/// Query parameters for the coin search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchCoinsQuery {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoinSearchResult {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub in_portfolio: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoinSearchResponse {
    pub results: Vec<CoinSearchResult>,
    /// Matches before `limit` was applied
    pub total: usize,
}

/// GET /coins
pub async fn list_coins(
    State(state): State<AppState>,
    params: Result<Query<ListCoinsQuery>, QueryRejection>,
) -> ApiResult<Vec<CoinSummary>> {
    let Query(params) = params?;

    let coins = match params.search.as_deref().map(str::trim) {
        Some(search) if !search.is_empty() => state.market_data.search_coins(search).await?.0,
        _ => state.market_data.get_coins_list(false).await?,
    };

    Ok(Json(paginate(coins, params.skip, params.limit)))
}

/// GET /coins/search
pub async fn search_coins(
    State(state): State<AppState>,
    params: Result<Query<SearchCoinsQuery>, QueryRejection>,
) -> ApiResult<CoinSearchResponse> {
    let Query(params) = params?;

    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation(
            "query must contain at least 1 character".to_string(),
        ));
    }
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    let (matches, total) = state.market_data.search_coins(query).await?;

    let mut session = DbSession::begin(&state.pool);
    let held = state.portfolio.get_portfolio_coin_ids(&mut session).await;
    let held = finish(session, held).await?;

    let results = matches
        .into_iter()
        .take(limit)
        .map(|coin| CoinSearchResult {
            in_portfolio: held.contains(&coin.id),
            id: coin.id,
            symbol: coin.symbol,
            name: coin.name,
        })
        .collect::<Vec<_>>();

    debug!(query, total, returned = results.len(), "Coin search served");
    Ok(Json(CoinSearchResponse { results, total }))
}

/// GET /coins/:coin_id
pub async fn get_coin(
    State(state): State<AppState>,
    coin_id: Result<Path<String>, PathRejection>,
) -> ApiResult<CoinDetail> {
    let Path(coin_id) = coin_id?;
    let detail = state.market_data.get_coin_details(&coin_id).await?;
    Ok(Json(detail))
}

fn paginate<T>(items: Vec<T>, skip: Option<usize>, limit: Option<usize>) -> Vec<T> {
    let rest = items.into_iter().skip(skip.unwrap_or(0));
    match limit {
        Some(limit) => rest.take(limit).collect(),
        None => rest.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..10).collect();

        assert_eq!(paginate(items.clone(), None, None).len(), 10);
        assert_eq!(paginate(items.clone(), Some(8), None), vec![8, 9]);
        assert_eq!(paginate(items.clone(), Some(2), Some(3)), vec![2, 3, 4]);
        assert!(paginate(items, Some(20), Some(3)).is_empty());
    }
}
