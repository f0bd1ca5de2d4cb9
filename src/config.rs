use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::persistence::DatabaseConfig;
use crate::rate_limit::{RateLimiterConfig, DEFAULT_BUCKET_CAPACITY, DEFAULT_RATE_PER_SECOND};

pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for every API route, e.g. "/api"
    pub api_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            api_prefix: "/api".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream market data settings
#[derive(Clone)]
pub struct CoinGeckoConfig {
    pub api_url: String,
    pub api_key: Option<Zeroizing<String>>,
    /// TTL of the cached coin list
    pub cache_ttl: Duration,
    /// TTL of cached per-coin details
    pub detail_cache_ttl: Duration,
    pub timeout: Duration,
    pub rate_per_second: f64,
    pub bucket_capacity: u32,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_COINGECKO_API_URL.to_string(),
            api_key: None,
            cache_ttl: Duration::from_secs(86_400),
            detail_cache_ttl: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

impl fmt::Debug for CoinGeckoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinGeckoConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("cache_ttl", &self.cache_ttl)
            .field("detail_cache_ttl", &self.detail_cache_ttl)
            .field("timeout", &self.timeout)
            .field("rate_per_second", &self.rate_per_second)
            .field("bucket_capacity", &self.bucket_capacity)
            .finish()
    }
}

/// Whole-process configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub coingecko: CoinGeckoConfig,
    pub database: DatabaseConfig,
    pub rate_limiter: RateLimiterConfig,
}

impl AppConfig {
    /// Load from environment variables. Invalid values are logged and replaced by defaults.
    pub fn from_env() -> AppConfig {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(host) = lookup("SERVER_HOST").filter(|h| !h.trim().is_empty()) {
            config.server.host = host.trim().to_string();
        }
        config.server.port = parse_var(&lookup, "SERVER_PORT", config.server.port, |p| *p > 0);
        if let Some(prefix) = lookup("API_PREFIX") {
            config.server.api_prefix = normalize_prefix(&prefix);
        }

        if let Some(api_url) = lookup("COINGECKO_API_URL") {
            match url::Url::parse(api_url.trim()) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                    config.coingecko.api_url = api_url.trim().trim_end_matches('/').to_string();
                }
                Ok(parsed) => {
                    tracing::warn!(
                        "Invalid COINGECKO_API_URL scheme '{}', using default: {}",
                        parsed.scheme(),
                        config.coingecko.api_url
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse COINGECKO_API_URL '{}': {}, using default: {}",
                        api_url,
                        e,
                        config.coingecko.api_url
                    );
                }
            }
        }

        config.coingecko.api_key = lookup("COINGECKO_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Zeroizing::new);
        if config.coingecko.api_key.is_none() {
            tracing::warn!("COINGECKO_API_KEY not set, using the unauthenticated tier");
        }

        config.coingecko.cache_ttl = Duration::from_secs(parse_var(
            &lookup,
            "COINGECKO_CACHE_TTL",
            config.coingecko.cache_ttl.as_secs(),
            |s| *s > 0,
        ));
        config.coingecko.detail_cache_ttl = Duration::from_secs(parse_var(
            &lookup,
            "COINGECKO_DETAIL_CACHE_TTL",
            config.coingecko.detail_cache_ttl.as_secs(),
            |s| *s > 0,
        ));
        config.coingecko.timeout = Duration::from_secs(parse_var(
            &lookup,
            "COINGECKO_TIMEOUT_SECONDS",
            config.coingecko.timeout.as_secs(),
            |s| *s > 0,
        ));
        config.coingecko.rate_per_second = parse_var(
            &lookup,
            "COINGECKO_RATE_PER_SECOND",
            config.coingecko.rate_per_second,
            |r| r.is_finite() && *r > 0.0,
        );
        config.coingecko.bucket_capacity = parse_var(
            &lookup,
            "COINGECKO_BUCKET_CAPACITY",
            config.coingecko.bucket_capacity,
            |c| *c > 0,
        );

        config.rate_limiter.requests_per_minute = parse_var(
            &lookup,
            "API_RATE_LIMIT_PER_MINUTE",
            config.rate_limiter.requests_per_minute,
            |r| *r > 0,
        );

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database.url = url.trim().to_string();
        }
        config.database.max_connections = parse_var(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            config.database.max_connections,
            |c| *c > 0,
        );
        config.database.busy_timeout = Duration::from_secs(parse_var(
            &lookup,
            "DATABASE_BUSY_TIMEOUT_SECONDS",
            config.database.busy_timeout.as_secs(),
            |s| *s > 0,
        ));
        config.database.log_queries = parse_var(
            &lookup,
            "DATABASE_LOG_QUERIES",
            config.database.log_queries,
            |_| true,
        );

        config
    }
}

fn parse_var<F, T, V>(lookup: &F, key: &str, default: T, valid: V) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
    V: Fn(&T) -> bool,
{
    let raw = match lookup(key) {
        Some(raw) => raw,
        None => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            tracing::warn!("Invalid {} value: {}, using default: {}", key, value, default);
            default
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                key,
                raw,
                e,
                default
            );
            default
        }
    }
}

/// "api/" -> "/api", "/" -> ""
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
