use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::{finish, ApiError, ApiResult, DetailResponse};
use crate::application::router::AppState;
use crate::domain::entities::portfolio_entry::PortfolioEntryView;
use crate::domain::services::portfolio_summary::PortfolioSummary;
use crate::domain::value_objects::amount::Amount;
use crate::persistence::session::DbSession;

const ENTRY_NOT_FOUND: &str = "Portfolio entry not found";

#[derive(Debug, Deserialize)]
pub struct AddCoinRequest {
    pub coin_id: String,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub amount: Amount,
}

fn entry_not_found() -> ApiError {
    ApiError::NotFound(ENTRY_NOT_FOUND.to_string())
}

/// GET /portfolio
pub async fn get_portfolio(State(state): State<AppState>) -> ApiResult<Vec<PortfolioEntryView>> {
    let mut session = DbSession::begin(&state.pool);
    let entries = state.portfolio.get_portfolio_entries(&mut session).await;
    Ok(Json(finish(session, entries).await?))
}

/// POST /portfolio
pub async fn add_coin(
    State(state): State<AppState>,
    body: Result<Json<AddCoinRequest>, JsonRejection>,
) -> ApiResult<PortfolioEntryView> {
    let Json(request) = body?;
    let coin_id = request.coin_id.trim();
    if coin_id.is_empty() {
        return Err(ApiError::Validation("coin_id must not be empty".to_string()));
    }

    let mut session = DbSession::begin(&state.pool);
    let result = state
        .portfolio
        .add_coin_to_portfolio(&mut session, coin_id, &request.amount)
        .await;
    Ok(Json(finish(session, result).await?))
}

/// GET /portfolio/summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<PortfolioSummary> {
    let mut session = DbSession::begin(&state.pool);
    let summary = state.portfolio.get_portfolio_summary(&mut session).await;
    Ok(Json(finish(session, summary).await?))
}

/// POST /portfolio/refresh-prices
pub async fn refresh_prices(State(state): State<AppState>) -> ApiResult<DetailResponse> {
    let mut session = DbSession::begin(&state.pool);
    let updated = state.portfolio.refresh_coin_prices(&mut session).await;
    let updated = finish(session, updated).await?;

    info!("Price refresh updated {} coins", updated);
    Ok(Json(DetailResponse::new(format!(
        "Updated prices for {} coins",
        updated
    ))))
}

/// GET /portfolio/:entry_id
pub async fn get_entry(
    State(state): State<AppState>,
    entry_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<PortfolioEntryView> {
    let Path(entry_id) = entry_id?;

    let mut session = DbSession::begin(&state.pool);
    let entry = state.portfolio.get_portfolio_entry(&mut session, entry_id).await;
    finish(session, entry)
        .await?
        .map(Json)
        .ok_or_else(entry_not_found)
}

/// PUT /portfolio/:entry_id
pub async fn update_entry(
    State(state): State<AppState>,
    entry_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> ApiResult<PortfolioEntryView> {
    let Path(entry_id) = entry_id?;
    let Json(request) = body?;

    let mut session = DbSession::begin(&state.pool);
    let updated = state
        .portfolio
        .update_portfolio_entry(&mut session, entry_id, &request.amount)
        .await;
    finish(session, updated)
        .await?
        .map(Json)
        .ok_or_else(entry_not_found)
}

/// DELETE /portfolio/:entry_id
pub async fn delete_entry(
    State(state): State<AppState>,
    entry_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<DetailResponse> {
    let Path(entry_id) = entry_id?;

    let mut session = DbSession::begin(&state.pool);
    let removed = state
        .portfolio
        .remove_portfolio_entry(&mut session, entry_id)
        .await;
    if !finish(session, removed).await? {
        return Err(entry_not_found());
    }

    Ok(Json(DetailResponse::new(
        "Portfolio entry deleted successfully",
    )))
}
