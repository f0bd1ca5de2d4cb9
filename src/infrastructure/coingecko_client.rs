//! CoinGecko HTTP transport
//!
//! Plain `reqwest` calls against the public v3 API. Pacing and caching live in
//! `CoinGeckoService`; this type only speaks HTTP and maps status codes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use url::Url;
use zeroize::Zeroizing;

use crate::config::CoinGeckoConfig;
use crate::domain::errors::MarketDataError;
use crate::domain::repositories::price_api::PriceApi;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

const DETAIL_QUERY: [(&str, &str); 5] = [
    ("localization", "false"),
    ("tickers", "false"),
    ("market_data", "true"),
    ("community_data", "false"),
    ("developer_data", "false"),
];

pub struct CoinGeckoHttpClient {
    base_url: String,
    api_key: Option<Zeroizing<String>>,
    timeout: Duration,
    /// Created on first request, dropped by `close()`
    client: Mutex<Option<Client>>,
}

impl CoinGeckoHttpClient {
    pub fn new(config: &CoinGeckoConfig) -> Self {
        info!(
            base_url = %config.api_url,
            authenticated = config.api_key.is_some(),
            "CoinGecko client configured"
        );
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            client: Mutex::new(None),
        }
    }

    async fn http_client(&self) -> Result<Client, MarketDataError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder().timeout(self.timeout).build()?;
        debug!("Opened CoinGecko HTTP client");
        *guard = Some(client.clone());
        Ok(client)
    }

    /// `{base_url}/{segments...}` with every segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, MarketDataError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MarketDataError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| MarketDataError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Value, MarketDataError> {
        let client = self.http_client().await?;
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        debug!("Making request to: {}", url);

        let mut request = client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.as_str());
        }

        let response = request.send().await.map_err(|e| {
            error!("CoinGecko request to {} failed: {}", path, e);
            MarketDataError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("CoinGecko API error for {}: {} {}", path, status, message);
            return Err(MarketDataError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl PriceApi for CoinGeckoHttpClient {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_coins_list(&self) -> Result<Value, MarketDataError> {
        self.get_json(&["coins", "list"], &[]).await
    }

    async fn fetch_coin(&self, coin_id: &str) -> Result<Value, MarketDataError> {
        // "." and ".." would be dropped from the path and hit another endpoint.
        if matches!(coin_id, "" | "." | "..") {
            return Err(MarketDataError::CoinNotFound(coin_id.to_string()));
        }

        match self.get_json(&["coins", coin_id], &DETAIL_QUERY).await {
            Err(MarketDataError::Upstream { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(MarketDataError::CoinNotFound(coin_id.to_string()))
            }
            other => other,
        }
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            info!("CoinGecko HTTP client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn coins_list(headers: HeaderMap) -> Result<Json<Value>, AxumStatus> {
        match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
            Some("test-key") => Ok(Json(json!([
                {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"}
            ]))),
            _ => Err(AxumStatus::UNAUTHORIZED),
        }
    }

    async fn coin(
        Path(id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, AxumStatus> {
        if id != "bitcoin" {
            return Err(AxumStatus::NOT_FOUND);
        }
        if params.get("market_data").map(String::as_str) != Some("true") {
            return Err(AxumStatus::BAD_REQUEST);
        }
        Ok(Json(json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "market_data": {"current_price": {"usd": 50000}},
            "tickers_requested": params.get("tickers"),
        })))
    }

    async fn start_mock_server() -> String {
        let app = Router::new()
            .route("/api/v3/coins/list", get(coins_list))
            .route("/api/v3/coins/:id", get(coin))
            .route(
                "/api/v3/broken/coins/list",
                get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/api/v3", addr)
    }

    fn client_for(base_url: &str, api_key: Option<&str>) -> CoinGeckoHttpClient {
        CoinGeckoHttpClient::new(&CoinGeckoConfig {
            api_url: base_url.to_string(),
            api_key: api_key.map(|k| Zeroizing::new(k.to_string())),
            ..CoinGeckoConfig::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_coins_list_sends_api_key() {
        let base = start_mock_server().await;
        let client = client_for(&base, Some("test-key"));

        let list = client.fetch_coins_list().await.unwrap();

        assert_eq!(list[0]["id"], "bitcoin");
    }

    #[tokio::test]
    async fn test_missing_api_key_surfaces_upstream_status() {
        let base = start_mock_server().await;
        let client = client_for(&base, None);

        let result = client.fetch_coins_list().await;

        assert!(matches!(
            result,
            Err(MarketDataError::Upstream { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_coin_sends_detail_query() {
        let base = start_mock_server().await;
        let client = client_for(&base, None);

        let coin = client.fetch_coin("bitcoin").await.unwrap();

        assert_eq!(coin["market_data"]["current_price"]["usd"], 50000);
        assert_eq!(coin["tickers_requested"], "false");
    }

    #[tokio::test]
    async fn test_unknown_coin_maps_to_not_found() {
        let base = start_mock_server().await;
        let client = client_for(&base, None);

        let result = client.fetch_coin("no-such-coin").await;

        assert!(matches!(result, Err(MarketDataError::CoinNotFound(id)) if id == "no-such-coin"));
    }

    #[tokio::test]
    async fn test_coin_id_stays_inside_its_path_segment() {
        let base = start_mock_server().await;
        let client = client_for(&base, Some("test-key"));

        for coin_id in ["../coins/list", "..", "bitcoin?tickers=true", "bitcoin#x", "a/b"] {
            let result = client.fetch_coin(coin_id).await;
            assert!(
                matches!(&result, Err(MarketDataError::CoinNotFound(id)) if id == coin_id),
                "{} -> {:?}",
                coin_id,
                result
            );
        }
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client_for("https://api.coingecko.com/api/v3/", None);

        let url = client.endpoint(&["coins", "../list?x=1"]).unwrap();

        assert_eq!(url.path(), "/api/v3/coins/..%2Flist%3Fx=1");
        assert_eq!(url.query(), None);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_upstream() {
        let base = start_mock_server().await;
        let client = client_for(&format!("{}/broken", base), Some("test-key"));

        let result = client.fetch_coins_list().await;

        assert!(matches!(
            result,
            Err(MarketDataError::Upstream { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_close_then_reuse_reopens_client() {
        let base = start_mock_server().await;
        let client = client_for(&base, Some("test-key"));

        client.fetch_coins_list().await.unwrap();
        client.close().await;
        assert!(client.client.lock().await.is_none());

        assert!(client.fetch_coins_list().await.is_ok());
        assert!(client.client.lock().await.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}", addr), None);
        let result = client.fetch_coins_list().await;

        assert!(matches!(result, Err(MarketDataError::Transport(_))));
    }
}
