//! API Middleware (Auth, Rate Limiting, Logging)

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::handlers::AppState;
use super::types::ErrorBody;
use crate::models::AppError;

/// Paths that are exempt from token auth. Spark cannot send our token, so
/// the webhook endpoint authenticates with an HMAC signature instead.
const AUTH_EXEMPT_PATHS: &[&str] = &["/api/v1/webhook"];

/// Rate limiter configuration
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    /// Window duration
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100, // 100 requests
            window_duration: Duration::from_secs(60), // per minute
        }
    }
}

/// In-memory rate limiter keyed on the caller's address.
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    /// Check if request is allowed, returns (allowed, remaining, reset_seconds)
    pub fn check(&self, key: &str) -> (bool, u32, u64) {
        let now = Instant::now();

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        // Reset window if expired
        if now.duration_since(entry.1) > self.config.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let remaining = self.config.requests_per_window.saturating_sub(entry.0);
        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.config.requests_per_window {
            return (false, 0, reset_secs);
        }

        entry.0 += 1;
        (true, remaining - 1, reset_secs)
    }

    /// Cleanup old entries (call periodically)
    #[allow(dead_code)]
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.requests.retain(|_, (_, timestamp)| {
            now.duration_since(*timestamp) < self.config.window_duration * 2
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// Global rate limiter instance
lazy_static::lazy_static! {
    pub static ref RATE_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::default());
}

/// Shared-token authentication middleware.
///
/// Every API route except the webhook callback requires a `Token` header
/// matching `ZPARK_API_TOKEN`. A request with no header is a 401. If the
/// header is present but no token is configured server-side that is our
/// misconfiguration, not the caller's, so it is a 500.
pub async fn token_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if AUTH_EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let presented = headers.get("Token").and_then(|v| v.to_str().ok());

    let Some(presented) = presented else {
        warn!(path = %request.uri().path(), "Request without Token header");
        return AppError::unauthorized().into_response();
    };

    let Some(expected) = state.config.api_token.as_deref() else {
        warn!("Token presented but ZPARK_API_TOKEN is not configured");
        return AppError::internal("API token is not configured on the server").into_response();
    };

    if presented != expected {
        warn!(path = %request.uri().path(), "Invalid API token presented");
        return AppError::unauthorized().into_response();
    }

    next.run(request).await
}

/// The bucket key for a caller: forwarding headers when behind a proxy,
/// otherwise the peer address, so that direct callers do not all share
/// one bucket.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let rate_key = client_key(&headers, peer);

    let (allowed, remaining, reset) = RATE_LIMITER.check(&rate_key);

    if !allowed {
        warn!(key = %rate_key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("Rate limit exceeded")),
        )
            .into_response();
    }

    let mut response = next.run(request).await;

    // Add rate limit headers
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Remaining", remaining.into());
    headers.insert("X-RateLimit-Reset", reset.into());

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_counts_down() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 2,
            window_duration: Duration::from_secs(60),
        });
        let (allowed, remaining, _) = limiter.check("1.2.3.4");
        assert!(allowed);
        assert_eq!(remaining, 1);
        let (allowed, remaining, _) = limiter.check("1.2.3.4");
        assert!(allowed);
        assert_eq!(remaining, 0);
        let (allowed, _, _) = limiter.check("1.2.3.4");
        assert!(!allowed);
        // Other keys are independent
        let (allowed, _, _) = limiter.check("5.6.7.8");
        assert!(allowed);
    }

    #[test]
    fn test_client_key_falls_back_to_peer_address() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.7:54321".parse().unwrap();

        // No forwarding headers: the peer IP keys the bucket
        assert_eq!(client_key(&headers, Some(peer)), "192.0.2.7");

        // Two direct callers must not share a bucket
        let other: SocketAddr = "192.0.2.8:54321".parse().unwrap();
        assert_ne!(client_key(&headers, Some(peer)), client_key(&headers, Some(other)));

        // A proxy header wins over the peer address
        headers.insert("X-Forwarded-For", "203.0.113.1".parse().unwrap());
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.1");

        // Nothing at all still yields a stable key
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");
    }
}
