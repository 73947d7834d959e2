//! Handler for per-advertisement click counts.

use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::json;

use crate::api::dto::analytics::{AnalyticsQuery, AnalyticsResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Returns the aggregate click count for one advertisement.
///
/// # Endpoint
///
/// `GET /ads/analytics?ad_id=1`
///
/// The count comes from the aggregate counter, not the click log, and may
/// trail the log after counter outages. Unknown ids report 0.
///
/// # Errors
///
/// - 400 Bad Request if `ad_id` is missing or empty.
/// - 503 Service Unavailable if the counter store is unreachable.
pub async fn analytics_handler(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let ad_id = query
        .ad_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::bad_request("missing advertisement id", json!({ "field": "ad_id" }))
        })?;

    let click_count = state.click_service.get_click_count(&ad_id).await?;

    Ok(Json(AnalyticsResponse { ad_id, click_count }))
}
