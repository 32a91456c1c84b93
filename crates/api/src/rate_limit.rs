//! API rate limiting middleware.
//!
//! Fixed-window limits per user (or per client IP for anonymous requests).
//! The global layer applies the standard tier and exposes the limiter to
//! route layers that add stricter tiers for writes, uploads and sign-in.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use habitgrid_db::entities::user;
use tokio::sync::RwLock;

/// Rate limit configuration for one tier.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Tier name, part of the counter key.
    pub name: &'static str,
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Time window duration in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Create a new rate limit config.
    #[must_use]
    pub const fn new(name: &'static str, max_requests: u32, window_secs: u64) -> Self {
        Self {
            name,
            max_requests,
            window_secs,
        }
    }
}

/// Default rate limits for different endpoint categories.
pub mod limits {
    use super::RateLimitConfig;

    /// Every API request.
    pub const STANDARD: RateLimitConfig = RateLimitConfig::new("standard", 300, 60);

    /// State-changing requests (save, like, follow, ...).
    pub const WRITE: RateLimitConfig = RateLimitConfig::new("write", 60, 60);

    /// Photo uploads.
    pub const UPLOAD: RateLimitConfig = RateLimitConfig::new("upload", 10, 60);

    /// Sign-up and sign-in.
    pub const AUTH: RateLimitConfig = RateLimitConfig::new("auth", 10, 300);

    /// Longest window of all tiers.
    pub const MAX_WINDOW_SECS: u64 = 300;
}

/// Rate limit state for a single key.
#[derive(Debug, Clone)]
struct RateLimitState {
    count: u32,
    window_start: Instant,
}

impl RateLimitState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }
}

/// In-memory fixed-window rate limiter.
#[derive(Clone, Default)]
pub struct ApiRateLimiter {
    states: Arc<RwLock<HashMap<String, RateLimitState>>>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a request is allowed and record it.
    pub async fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let window = Duration::from_secs(config.window_secs);

        let state = states
            .entry(format!("{}:{key}", config.name))
            .or_insert_with(RateLimitState::new);

        if now.duration_since(state.window_start) >= window {
            state.count = 0;
            state.window_start = now;
        }

        let reset = window
            .saturating_sub(now.duration_since(state.window_start))
            .as_secs();

        if state.count >= config.max_requests {
            return RateLimitResult::Limited {
                // never tell clients to retry immediately
                retry_after: reset.max(1),
                limit: config.max_requests,
            };
        }

        state.count += 1;
        RateLimitResult::Allowed {
            remaining: config.max_requests.saturating_sub(state.count),
            limit: config.max_requests,
            reset,
        }
    }

    /// Drop keys whose window ended long ago.
    pub async fn cleanup(&self, max_window_secs: u64) {
        let mut states = self.states.write().await;
        let now = Instant::now();
        let max_window = Duration::from_secs(max_window_secs * 2);

        states.retain(|_, state| now.duration_since(state.window_start) < max_window);
    }

    /// Get the number of tracked keys.
    pub async fn key_count(&self) -> usize {
        self.states.read().await.len()
    }
}

/// Rate limit check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed {
        remaining: u32,
        limit: u32,
        /// Seconds until window reset.
        reset: u64,
    },
    Limited {
        /// Seconds until the window resets.
        retry_after: u64,
        limit: u32,
    },
}

/// Rate limiter state for middleware.
#[derive(Clone, Default)]
pub struct RateLimiterState {
    /// Per-user rate limiter.
    pub user_limiter: ApiRateLimiter,
    /// Per-IP rate limiter (for unauthenticated requests).
    pub ip_limiter: ApiRateLimiter,
}

impl RateLimiterState {
    /// Create a new rate limiter state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop stale keys from both limiters.
    pub async fn cleanup(&self) {
        self.user_limiter.cleanup(limits::MAX_WINDOW_SECS).await;
        self.ip_limiter.cleanup(limits::MAX_WINDOW_SECS).await;
        let user_keys = self.user_limiter.key_count().await;
        let ip_keys = self.ip_limiter.key_count().await;
        tracing::debug!(
            user_keys = user_keys,
            ip_keys = ip_keys,
            "Rate limiter cleaned up"
        );
    }
}

/// Rate limit error response.
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "RATE_LIMITED",
                "message": "Too many requests",
                "retryAfter": self.retry_after
            }
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [
                ("Retry-After", self.retry_after.to_string()),
                ("Content-Type", "application/json".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

/// Extract client IP from proxy headers or the peer address.
fn extract_client_ip(req: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

/// Global rate limiting middleware (standard tier).
///
/// Must run inside the auth layer so signed-in users are keyed by id.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    req.extensions_mut().insert(limiter.clone());
    check_tier(&limiter, req, next, &limits::STANDARD).await
}

/// Route layer for state-changing requests.
pub async fn rate_limit_write_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    with_tier(req, next, &limits::WRITE).await
}

/// Route layer for uploads.
pub async fn rate_limit_upload_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    with_tier(req, next, &limits::UPLOAD).await
}

/// Route layer for sign-up and sign-in.
pub async fn rate_limit_auth_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, RateLimitError> {
    with_tier(req, next, &limits::AUTH).await
}

async fn with_tier(
    req: Request<Body>,
    next: Next,
    config: &RateLimitConfig,
) -> Result<Response, RateLimitError> {
    // Without the global layer there is no limiter to consult.
    let Some(limiter) = req.extensions().get::<RateLimiterState>().cloned() else {
        return Ok(next.run(req).await);
    };
    check_tier(&limiter, req, next, config).await
}

async fn check_tier(
    limiter: &RateLimiterState,
    req: Request<Body>,
    next: Next,
    config: &RateLimitConfig,
) -> Result<Response, RateLimitError> {
    let result = if let Some(user) = req.extensions().get::<user::Model>() {
        limiter.user_limiter.check(&user.id, config).await
    } else {
        let key = extract_client_ip(&req).map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
        limiter.ip_limiter.check(&key, config).await
    };

    match result {
        RateLimitResult::Allowed {
            remaining,
            limit,
            reset,
        } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit.into());
            headers.insert("X-RateLimit-Remaining", remaining.into());
            headers.insert("X-RateLimit-Reset", reset.into());
            Ok(response)
        }
        RateLimitResult::Limited { retry_after, .. } => {
            tracing::debug!(tier = config.name, retry_after, "Request rate limited");
            Err(RateLimitError { retry_after })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new("t", 5, 60);

        for _ in 0..5 {
            assert!(matches!(
                limiter.check("user1", &config).await,
                RateLimitResult::Allowed { .. }
            ));
        }
        assert!(matches!(
            limiter.check("user1", &config).await,
            RateLimitResult::Limited { retry_after, limit: 5 } if retry_after > 0
        ));
    }

    #[tokio::test]
    async fn test_separate_keys_and_tiers() {
        let limiter = ApiRateLimiter::new();
        let write = RateLimitConfig::new("write", 1, 60);
        let standard = RateLimitConfig::new("standard", 1, 60);

        limiter.check("user_a", &write).await;
        assert!(matches!(
            limiter.check("user_b", &write).await,
            RateLimitResult::Allowed { .. }
        ));
        // a spent write tier leaves the standard tier untouched
        assert!(matches!(
            limiter.check("user_a", &standard).await,
            RateLimitResult::Allowed { .. }
        ));
        assert_eq!(limiter.key_count().await, 3);
    }

    #[tokio::test]
    async fn test_remaining_counts_down() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new("t", 10, 60);

        match limiter.check("u", &config).await {
            RateLimitResult::Allowed {
                remaining,
                limit,
                reset,
            } => {
                assert_eq!(remaining, 9);
                assert_eq!(limit, 10);
                assert!(reset <= 60);
            }
            RateLimitResult::Limited { .. } => panic!("Expected Allowed"),
        }
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_keys() {
        let limiter = ApiRateLimiter::new();
        let config = RateLimitConfig::new("t", 10, 1);
        limiter.check("user1", &config).await;

        limiter.cleanup(1).await;
        assert_eq!(limiter.key_count().await, 1);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }
}
