//! Request pacing.
//!
//! Two limiters live here:
//! - [`TokenBucketRateLimiter`] paces our outbound calls to the price API. Callers
//!   wait for tokens instead of being rejected.
//! - [`create_rate_limiter`] / [`rate_limit_middleware`] reject inbound HTTP requests
//!   over a per-minute quota with `429 Too Many Requests`.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// 30 requests per minute, the public CoinGecko tier.
pub const DEFAULT_RATE_PER_SECOND: f64 = 0.5;
pub const DEFAULT_BUCKET_CAPACITY: u32 = 30;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Cannot acquire {requested} tokens from a bucket of capacity {capacity}")]
    ExceedsCapacity { requested: u32, capacity: u32 },
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket with continuous refill.
///
/// The whole acquire (refill, optional sleep, refill, debit) runs under one lock, so
/// concurrent callers are served one at a time in the order the mutex hands out.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    rate: f64,
    capacity: u32,
    state: Mutex<BucketState>,
}

impl TokenBucketRateLimiter {
    /// Create a full bucket refilling at `rate_per_second`.
    ///
    /// Non-positive or non-finite rates fall back to [`DEFAULT_RATE_PER_SECOND`]; a zero
    /// capacity is raised to one token.
    pub fn new(rate_per_second: f64, capacity: u32) -> Self {
        let rate = if rate_per_second.is_finite() && rate_per_second > 0.0 {
            rate_per_second
        } else {
            DEFAULT_RATE_PER_SECOND
        };
        let capacity = capacity.max(1);

        tracing::info!(
            rate_per_second = rate,
            capacity,
            "Token bucket rate limiter initialized"
        );

        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Wait until `tokens` are available, then debit them.
    pub async fn acquire(&self, tokens: u32) -> Result<(), RateLimitError> {
        if tokens > self.capacity {
            return Err(RateLimitError::ExceedsCapacity {
                requested: tokens,
                capacity: self.capacity,
            });
        }

        let requested = tokens as f64;
        let capacity = self.capacity as f64;
        let mut state = self.state.lock().await;
        state.refill(self.rate, capacity);

        if state.tokens < requested {
            let wait = Duration::from_secs_f64((requested - state.tokens) / self.rate);
            debug!(
                available = state.tokens,
                wait_ms = wait.as_millis() as u64,
                "Not enough tokens, waiting"
            );
            tokio::time::sleep(wait).await;
            state.refill(self.rate, capacity);
        }

        // Float drift after the sleep can leave us a hair short of `requested`.
        state.tokens = (state.tokens - requested).max(0.0);
        debug!(remaining = state.tokens, "Tokens acquired");
        Ok(())
    }

    pub async fn acquire_one(&self) -> Result<(), RateLimitError> {
        self.acquire(1).await
    }

    /// Current token level after applying pending refill.
    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.rate, self.capacity as f64);
        state.tokens
    }
}

impl Default for TokenBucketRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_PER_SECOND, DEFAULT_BUCKET_CAPACITY)
    }
}

/// Inbound rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 600,
        }
    }
}

/// Process-wide inbound limiter shared by every route
pub type ApiRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new inbound rate limiter. A zero quota is treated as one request per minute.
pub fn create_rate_limiter(config: RateLimiterConfig) -> ApiRateLimiter {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Middleware to apply inbound rate limiting
pub async fn rate_limit_middleware(
    limiter: ApiRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Inbound rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "detail": "Rate limit exceeded. Please try again later."
                })),
            )
                .into_response()
        }
    }
}
