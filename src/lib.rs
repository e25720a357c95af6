//! Drivedesk: self-hosted backend for a driving school website.
//!
//! Serves the public landing endpoints (lead form, reviews, site profile),
//! the admin dashboard API and a WebSocket change-event stream, with the
//! static frontend mounted behind everything else.

pub mod api;
pub mod config;
pub mod db;
pub mod notifications;
pub mod startup;
pub mod utils;

pub use db::DbPool;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast;

use crate::api::events::{ChangeEvent, EVENT_CHANNEL_CAPACITY};
use crate::api::rate_limit::RateLimiter;
use crate::config::Config;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Change-event bus; handlers publish, WebSocket sessions subscribe.
    pub events: broadcast::Sender<ChangeEvent>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config,
            db,
            events,
            metrics_handle: None,
        }
    }

    /// Attach the Prometheus recorder handle when metrics are enabled.
    pub fn with_metrics(self, handle: PrometheusHandle) -> Self {
        Self {
            metrics_handle: Some(handle),
            ..self
        }
    }
}
