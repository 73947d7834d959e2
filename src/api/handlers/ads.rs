//! Handler for the advertisement listing.

use axum::{Json, extract::State};

use crate::api::dto::ads::AdResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Lists all advertisements.
///
/// # Endpoint
///
/// `GET /ads`
///
/// # Response
///
/// ```json
/// [
///   { "id": "1", "image_url": "https://...", "target_url": "https://..." }
/// ]
/// ```
///
/// # Errors
///
/// Returns 503 Service Unavailable if the database is unreachable.
pub async fn list_ads_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdResponse>>, AppError> {
    let ads = state.ad_service.list_advertisements().await?;
    Ok(Json(ads.into_iter().map(AdResponse::from).collect()))
}
