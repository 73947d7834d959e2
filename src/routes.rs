//! Top-level router.
//!
//! # Route Structure
//!
//! - `/ads*`       - Advertisement listing, click ingestion, analytics (throttled)
//! - `GET /health` - Dependency reachability and breaker states
//! - `GET /metrics` - Prometheus exposition
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Request metrics** - `http_requests_total` and latency per route template
//! - **Edge throttle** - Per-peer token bucket on `/ads*`
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, metrics_handler};
use crate::api::middleware::http_metrics::track_requests;
use crate::api::middleware::rate_limit::EdgeThrottleLayer;
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState, throttle: EdgeThrottleLayer) -> NormalizePath<Router> {
    let router = Router::new()
        .merge(api::routes::ad_routes().layer(throttle))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn(track_requests))
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
