//! Per-IP rate limiting middleware.
//!
//! Three tiers: the authenticated admin API, the unauthenticated public
//! forms (deliberately tight, they are spam magnets), and the auth
//! endpoints (login brute force).

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Authenticated admin endpoints
    Api,
    /// Public form endpoints
    Public,
    /// Login and setup endpoints
    Auth,
}

/// Token bucket tracked per (IP, tier). Tokens are fractional so refill
/// accrues smoothly between requests instead of in whole-window steps.
#[derive(Debug, Clone)]
struct Bucket {
    available: f64,
    touched_at: Instant,
}

/// Pure refill step: `elapsed` seconds at `rate` tokens/sec, capped at the
/// tier limit.
fn refill(available: f64, limit: f64, rate: f64, elapsed: f64) -> f64 {
    (available + elapsed * rate).min(limit)
}

/// What the middleware needs to emit X-RateLimit-* headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    pub reset_after: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RateLimitTier), Bucket>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            window: Duration::from_secs(config.window_seconds),
            config,
        }
    }

    fn tier_limit(&self, tier: RateLimitTier) -> u32 {
        match tier {
            RateLimitTier::Api => self.config.api_requests_per_window,
            RateLimitTier::Public => self.config.public_requests_per_window,
            RateLimitTier::Auth => self.config.auth_requests_per_window,
        }
    }

    /// Take one token for this client, or report how long until one is back.
    pub fn check_rate_limit(&self, ip: IpAddr, tier: RateLimitTier) -> Result<RateLimitInfo, u64> {
        if !self.config.enabled {
            return Ok(RateLimitInfo {
                remaining: u32::MAX,
                limit: u32::MAX,
                reset_after: 0,
            });
        }

        let limit = self.tier_limit(tier);
        let rate = f64::from(limit) / self.window.as_secs_f64();
        let now = Instant::now();

        let mut bucket = self.buckets.entry((ip, tier)).or_insert_with(|| Bucket {
            available: f64::from(limit),
            touched_at: now,
        });

        let elapsed = now.duration_since(bucket.touched_at).as_secs_f64();
        bucket.available = refill(bucket.available, f64::from(limit), rate, elapsed);
        bucket.touched_at = now;

        if bucket.available >= 1.0 {
            bucket.available -= 1.0;
            let reset_after = ((f64::from(limit) - bucket.available) / rate).ceil() as u64;
            Ok(RateLimitInfo {
                remaining: bucket.available as u32,
                limit,
                reset_after,
            })
        } else {
            let retry_after = ((1.0 - bucket.available) / rate).ceil().max(1.0) as u64;
            Err(retry_after)
        }
    }

    /// Drop buckets idle long enough to be full again anyway.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let idle_cutoff = self.window * 2;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.touched_at) < idle_cutoff);
    }

    pub fn entry_count(&self) -> usize {
        self.buckets.len()
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For may hold a chain; the first hop is the client
    value.split(',').next()?.trim().parse().ok()
}

fn client_ip(request: &Request<Body>) -> IpAddr {
    header_ip(request.headers(), "x-forwarded-for")
        .or_else(|| header_ip(request.headers(), "x-real-ip"))
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

fn set_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: u64) {
    for (name, value) in [
        ("X-RateLimit-Limit", limit.to_string()),
        ("X-RateLimit-Remaining", remaining.to_string()),
        ("X-RateLimit-Reset", reset.to_string()),
    ] {
        if let Ok(value) = value.parse() {
            headers.insert(name, value);
        }
    }
}

async fn enforce(
    state: Arc<AppState>,
    request: Request<Body>,
    next: Next,
    tier: RateLimitTier,
) -> Result<Response, Response> {
    let ip = client_ip(&request);

    match state.rate_limiter.check_rate_limit(ip, tier) {
        Ok(info) => {
            let mut response = next.run(request).await;
            set_rate_headers(
                response.headers_mut(),
                info.limit,
                info.remaining,
                info.reset_after,
            );
            Ok(response)
        }
        Err(retry_after) => {
            let limit = state.rate_limiter.tier_limit(tier);
            let body = Json(serde_json::json!({
                "error": {
                    "code": "too_many_requests",
                    "message": format!("Rate limit exceeded. Try again in {} seconds.", retry_after),
                }
            }));

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            set_rate_headers(response.headers_mut(), limit, 0, retry_after);
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
            Err(response)
        }
    }
}

pub async fn rate_limit_api(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    enforce(state, request, next, RateLimitTier::Api).await
}

pub async fn rate_limit_public(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    enforce(state, request, next, RateLimitTier::Public).await
}

pub async fn rate_limit_auth(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    enforce(state, request, next, RateLimitTier::Auth).await
}

/// Periodically drop idle buckets so the map does not grow with every
/// client IP ever seen.
pub fn spawn_cleanup_task(rate_limiter: Arc<RateLimiter>, cleanup_interval_secs: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(cleanup_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            rate_limiter.cleanup_expired();
            tracing::debug!(
                entries = rate_limiter.entry_count(),
                "Rate limiter cleanup complete"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            api_requests_per_window: 10,
            public_requests_per_window: 3,
            auth_requests_per_window: 5,
            window_seconds: 60,
            cleanup_interval: 300,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_burst_up_to_limit_then_blocked() {
        let limiter = RateLimiter::new(test_config());

        for i in 0..10 {
            assert!(
                limiter.check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api).is_ok(),
                "request {} within the burst should pass",
                i
            );
        }
        assert!(limiter
            .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api)
            .is_err());
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..3 {
            let _ = limiter.check_rate_limit(ip("192.168.1.1"), RateLimitTier::Public);
        }

        let retry_after = limiter
            .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Public)
            .unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_ips_do_not_share_buckets() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..10 {
            let _ = limiter.check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api);
        }

        assert!(limiter
            .check_rate_limit(ip("192.168.1.2"), RateLimitTier::Api)
            .is_ok());
    }

    #[test]
    fn test_tiers_do_not_share_buckets() {
        let limiter = RateLimiter::new(test_config());

        for _ in 0..3 {
            let _ = limiter.check_rate_limit(ip("192.168.1.1"), RateLimitTier::Public);
        }

        assert!(limiter
            .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Public)
            .is_err());
        assert!(limiter
            .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api)
            .is_ok());
    }

    #[test]
    fn test_info_reports_the_tier_limit() {
        let limiter = RateLimiter::new(test_config());

        let api = limiter.check_rate_limit(ip("10.0.0.1"), RateLimitTier::Api).unwrap();
        let public = limiter
            .check_rate_limit(ip("10.0.0.1"), RateLimitTier::Public)
            .unwrap();
        let auth = limiter.check_rate_limit(ip("10.0.0.1"), RateLimitTier::Auth).unwrap();

        assert_eq!(api.limit, 10);
        assert_eq!(public.limit, 3);
        assert_eq!(auth.limit, 5);
    }

    #[test]
    fn test_disabled_limiter_passes_everything() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter
                .check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api)
                .is_ok());
        }
    }

    #[test]
    fn test_refill_accrues_and_caps() {
        // 10 tokens per 60s window
        let rate = 10.0 / 60.0;
        let topped_up = refill(0.0, 10.0, rate, 60.0);
        assert!((topped_up - 10.0).abs() < 1e-9);

        let partial = refill(0.0, 10.0, rate, 6.0);
        assert!((partial - 1.0).abs() < 1e-9);

        // Never exceeds the limit no matter how long the idle gap
        assert!((refill(9.5, 10.0, rate, 3600.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_cleanup_keeps_active_buckets() {
        let limiter = RateLimiter::new(test_config());
        let _ = limiter.check_rate_limit(ip("192.168.1.1"), RateLimitTier::Api);
        assert_eq!(limiter.entry_count(), 1);

        limiter.cleanup_expired();
        assert_eq!(limiter.entry_count(), 1);
    }
}
