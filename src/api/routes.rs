//! Advertisement and click routes.

use crate::api::handlers::{
    analytics_handler, list_ads_handler, record_click_handler, relay_click_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Routes under `/ads`.
///
/// # Endpoints
///
/// - `GET  /ads`               - List advertisements
/// - `POST /ads/click`         - Record a click synchronously
/// - `POST /ads/click/relay`   - Admit a click and publish it to the relay
/// - `GET  /ads/analytics`     - Aggregate click count (`?ad_id=`)
pub fn ad_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", get(list_ads_handler))
        .route("/ads/click", post(record_click_handler))
        .route("/ads/click/relay", post(relay_click_handler))
        .route("/ads/analytics", get(analytics_handler))
}
