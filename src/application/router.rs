use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::application::handlers::{coins_handler, portfolio_handler};
use crate::application::services::coin_gecko_service::CoinGeckoService;
use crate::application::services::portfolio_service::PortfolioService;
use crate::config::ServerConfig;
use crate::persistence::DbPool;
use crate::rate_limit::{rate_limit_middleware, ApiRateLimiter};

/// Maximum accepted request body (64 KiB)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub market_data: Arc<CoinGeckoService>,
    pub portfolio: Arc<PortfolioService>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        market_data: Arc<CoinGeckoService>,
        portfolio: Arc<PortfolioService>,
    ) -> Self {
        Self {
            pool,
            market_data,
            portfolio,
        }
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Coinfolio API is running"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "coinfolio-api"
    }))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/coins", get(coins_handler::list_coins))
        .route("/coins/search", get(coins_handler::search_coins))
        .route("/coins/:coin_id", get(coins_handler::get_coin))
        .route(
            "/portfolio",
            get(portfolio_handler::get_portfolio).post(portfolio_handler::add_coin),
        )
        .route("/portfolio/summary", get(portfolio_handler::get_summary))
        .route(
            "/portfolio/refresh-prices",
            post(portfolio_handler::refresh_prices),
        )
        .route(
            "/portfolio/:entry_id",
            get(portfolio_handler::get_entry)
                .put(portfolio_handler::update_entry)
                .delete(portfolio_handler::delete_entry),
        )
}

/// Assemble the HTTP application
pub fn build_router(state: AppState, server: &ServerConfig, limiter: ApiRateLimiter) -> Router {
    let router = Router::new().route("/", get(root));
    let router = if server.api_prefix.is_empty() {
        router.merge(api_routes())
    } else {
        router.nest(&server.api_prefix, api_routes())
    };

    router
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            rate_limit_middleware(limiter.clone(), req, next)
        }))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
