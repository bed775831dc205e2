//! Per-client request rate limiting
//!
//! Fixed-window counters kept in memory, keyed by client IP.

use crate::routes::{client_ip, AppState};
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Current count in the window
    pub current: u32,
    /// Maximum allowed in the window
    pub limit: u32,
    /// Seconds until the window resets
    pub reset_in_secs: u64,
    /// Remaining requests in this window
    pub remaining: u32,
}

impl RateLimitResult {
    /// Create headers for rate limit response
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_in_secs.to_string()),
        ]
    }
}

/// In-memory fixed-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<DashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Count one request for `key` and report whether it may proceed
    pub fn check(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let config = &self.config;

        let mut entry = self.buckets.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        // Reset if window expired
        if now.duration_since(*window_start) >= config.window {
            *count = 0;
            *window_start = now;
        }

        *count = count.saturating_add(1);
        let current = *count;
        let allowed = current <= config.max_requests;
        let elapsed = now.duration_since(*window_start);
        let reset_in_secs = config.window.as_secs().saturating_sub(elapsed.as_secs());

        RateLimitResult {
            allowed,
            current,
            limit: config.max_requests,
            reset_in_secs,
            remaining: config.max_requests.saturating_sub(current),
        }
    }

    /// Drop buckets whose window has passed
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.buckets.retain(|_, (_, start)| now.duration_since(*start) < window);
    }

    /// Number of tracked clients
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

/// Periodically forget expired buckets so idle clients do not accumulate
pub fn spawn_cleanup(limiter: RateLimiter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.config.window.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            limiter.cleanup();
        }
    })
}

/// Rate limit error response
fn rate_limit_response(result: &RateLimitResult) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        format!("Rate limit exceeded. Try again in {} seconds.", result.reset_in_secs),
    )
        .into_response();

    let headers = response.headers_mut();
    if let Ok(value) = result.reset_in_secs.to_string().parse() {
        headers.insert("Retry-After", value);
    }
    for (name, value) in result.headers() {
        if let Ok(value) = value.parse() {
            headers.insert(name, value);
        }
    }
    response
}

/// Middleware applying the limiter to every route
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&state.config, request.headers(), addr);
    let result = state.rate_limiter.check(&ip);

    if result.allowed {
        next.run(request).await
    } else {
        tracing::warn!(
            "Rate limit exceeded for {}: {}/{} requests",
            ip,
            result.current,
            result.limit
        );
        rate_limit_response(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(RateLimitConfig::new(3, Duration::from_secs(60)));

        // First 3 requests should be allowed
        for i in 1..=3 {
            let result = limiter.check("test");
            assert!(result.allowed, "Request {} should be allowed", i);
            assert_eq!(result.current, i as u32);
            assert_eq!(result.remaining, 3 - i as u32);
        }

        // 4th request should be blocked
        let result = limiter.check("test");
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);

        // Other clients are counted separately
        assert!(limiter.check("other").allowed);
    }

    #[test]
    fn test_window_reset_and_cleanup() {
        let limiter = RateLimiter::new(RateLimitConfig::new(1, Duration::ZERO));

        assert!(limiter.check("test").allowed);
        // Zero-length window expires immediately
        assert!(limiter.check("test").allowed);

        limiter.cleanup();
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_rate_limit_response_headers() {
        let limiter = RateLimiter::new(RateLimitConfig::new(0, Duration::from_secs(60)));
        let result = limiter.check("test");
        let response = rate_limit_response(&result);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "0");
        assert_eq!(response.headers()["Retry-After"], "60");
    }
}
