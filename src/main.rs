use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coinfolio::application::router::{build_router, AppState};
use coinfolio::application::services::coin_gecko_service::CoinGeckoService;
use coinfolio::application::services::portfolio_service::PortfolioService;
use coinfolio::config::AppConfig;
use coinfolio::infrastructure::coingecko_client::CoinGeckoHttpClient;
use coinfolio::infrastructure::memory_cache::MemoryCache;
use coinfolio::persistence::init_database_with;
use coinfolio::rate_limit::{create_rate_limiter, TokenBucketRateLimiter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinfolio=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Coinfolio API...");

    let config = AppConfig::from_env();
    info!(
        "Configuration loaded: {:?}, database {}",
        config.coingecko, config.database.url
    );

    let pool = init_database_with(&config.database).await?;

    let limiter = Arc::new(TokenBucketRateLimiter::new(
        config.coingecko.rate_per_second,
        config.coingecko.bucket_capacity,
    ));
    let cache = Arc::new(MemoryCache::new());
    let api = Arc::new(CoinGeckoHttpClient::new(&config.coingecko));
    let market_data = Arc::new(CoinGeckoService::from_config(
        &config.coingecko,
        api,
        cache,
        limiter,
    ));
    let portfolio = Arc::new(PortfolioService::new(market_data.clone()));
    let state = AppState::new(pool.clone(), market_data.clone(), portfolio);

    // Warm the coins list so the first search does not wait on the upstream.
    let prefetch = market_data.clone();
    tokio::spawn(async move {
        match prefetch.get_coins_list(true).await {
            Ok(coins) => info!("Prefetched {} coins", coins.len()),
            Err(e) => warn!("Failed to prefetch coins list: {}", e),
        }
    });

    let app = build_router(
        state,
        &config.server,
        create_rate_limiter(config.rate_limiter.clone()),
    );

    let addr = config.server.bind_address();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = on_signal("Ctrl+C", tokio::signal::ctrl_c());

        #[cfg(unix)]
        let terminate = on_signal("SIGTERM", async {
            let mut sig =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            sig.recv().await;
            Ok::<(), std::io::Error>(())
        });

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");

    market_data.close().await;
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve once `signal` fires. A handler that fails to install never resolves,
/// so the server keeps running until another signal arrives.
async fn on_signal<F>(name: &str, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received {} signal", name),
        Err(e) => {
            error!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}
