//! Prometheus exposition plus the middleware that feeds the HTTP series.
//!
//! Counters are incremented at the call sites that own the event (lead
//! handlers, review handlers, login). The two queue gauges are refreshed
//! from row counts each time `/metrics` is scraped.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::db::DbPool;
use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const LEADS_RECEIVED_TOTAL: &str = "leads_received_total";
pub const LEADS_UNREAD: &str = "leads_unread";
pub const REVIEWS_SUBMITTED_TOTAL: &str = "reviews_submitted_total";
pub const REVIEWS_APPROVED_TOTAL: &str = "reviews_approved_total";
pub const REVIEWS_PENDING: &str = "reviews_pending";
pub const EMAILS_SENT_TOTAL: &str = "emails_sent_total";
pub const AUTH_FAILURES_TOTAL: &str = "auth_failures_total";

const COUNTER_HELP: &[(&str, &str)] = &[
    (HTTP_REQUESTS_TOTAL, "HTTP requests processed"),
    (
        LEADS_RECEIVED_TOTAL,
        "Contact form leads received, labeled by service",
    ),
    (
        REVIEWS_SUBMITTED_TOTAL,
        "Reviews submitted through the public form",
    ),
    (REVIEWS_APPROVED_TOTAL, "Reviews approved for publication"),
    (EMAILS_SENT_TOTAL, "Notification emails sent"),
    (AUTH_FAILURES_TOTAL, "Failed login attempts"),
];

const GAUGE_HELP: &[(&str, &str)] = &[
    (LEADS_UNREAD, "Leads not yet read by an admin"),
    (REVIEWS_PENDING, "Reviews awaiting moderation"),
];

/// Install the Prometheus recorder and register metric descriptions.
/// Call once at startup, before any series is touched.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    for (name, help) in COUNTER_HELP {
        describe_counter!(*name, *help);
    }
    for (name, help) in GAUGE_HELP {
        describe_gauge!(*name, *help);
    }
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );

    handle
}

/// `GET /metrics` in the Prometheus text format. 503 when collection is off.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(handle) = state.metrics_handle.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics collection is disabled".to_string(),
        );
    };

    refresh_queue_gauges(&state.db).await;
    (StatusCode::OK, handle.render())
}

async fn count_rows(db: &DbPool, sql: &str) -> Option<f64> {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(db)
        .await
        .ok()
        .map(|n| n as f64)
}

/// The two gauges are point-in-time row counts, so they are read fresh on
/// every scrape rather than maintained incrementally.
async fn refresh_queue_gauges(db: &DbPool) {
    if let Some(unread) = count_rows(db, "SELECT COUNT(*) FROM leads WHERE is_read = 0").await {
        gauge!(LEADS_UNREAD).set(unread);
    }
    if let Some(pending) = count_rows(db, "SELECT COUNT(*) FROM reviews WHERE approved = 0").await {
        gauge!(REVIEWS_PENDING).set(pending);
    }
}

/// Label requests by route pattern, not raw path, to keep cardinality bounded.
fn route_label(request: &Request<Body>) -> String {
    match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => request.uri().path().to_string(),
    }
}

/// Records a count and a duration sample for every request that passes through.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = route_label(&request);
    let started = Instant::now();

    let response = next.run(request).await;

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "path" => path.clone()
    )
    .record(started.elapsed().as_secs_f64());

    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "path" => path,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);

    response
}

pub fn record_lead_received(service: &str) {
    counter!(LEADS_RECEIVED_TOTAL, "service" => service.to_string()).increment(1);
}

pub fn record_review_submitted() {
    counter!(REVIEWS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_review_approved() {
    counter!(REVIEWS_APPROVED_TOTAL).increment(1);
}

pub fn record_email_sent() {
    counter!(EMAILS_SENT_TOTAL).increment(1);
}

pub fn record_auth_failure() {
    counter!(AUTH_FAILURES_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_names_follow_prometheus_conventions() {
        for (name, _) in COUNTER_HELP {
            assert!(name.ends_with("_total"), "{name} should end in _total");
        }
        assert!(HTTP_REQUEST_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_gauges_are_not_named_like_counters() {
        for (name, _) in GAUGE_HELP {
            assert!(!name.ends_with("_total"), "{name} is a point-in-time gauge");
        }
    }

    #[test]
    fn test_described_names_are_unique() {
        let mut names: Vec<&str> = COUNTER_HELP
            .iter()
            .chain(GAUGE_HELP.iter())
            .map(|(name, _)| *name)
            .collect();
        names.push(HTTP_REQUEST_DURATION_SECONDS);
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
