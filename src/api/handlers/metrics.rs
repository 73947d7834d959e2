//! Handler for the Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Renders every recorded metric in the Prometheus text format.
///
/// # Endpoint
///
/// `GET /metrics`
///
/// # Response Codes
///
/// - **200 OK**: exposition text
/// - **404 Not Found**: no recorder installed
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
