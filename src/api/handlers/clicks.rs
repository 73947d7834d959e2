//! Handlers for click submission.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::clicks::{ClickRequest, ClickStatusResponse};
use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Records a click synchronously.
///
/// # Endpoint
///
/// `POST /ads/click`
///
/// # Request Body
///
/// ```json
/// { "ad_id": "1", "playback_time": 42 }
/// ```
///
/// The timestamp is set to the time of receipt and the source address to the
/// connection's peer address.
///
/// # Response Codes
///
/// - **200 OK**: `{"status": "Click recorded"}`
/// - **400 Bad Request**: malformed body or field (`ad_id` over 128 bytes is
///   refused before admission)
/// - **404 Not Found**: unknown advertisement
/// - **429 Too Many Requests**: source over its click ceiling
/// - **503 Service Unavailable**: database unreachable or its breaker open
pub async fn record_click_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<Json<ClickStatusResponse>, AppError> {
    let event = click_event(addr, body)?;
    state.click_service.record_click(event).await?;
    Ok(Json(ClickStatusResponse::RECORDED))
}

/// Admits a click and hands it to the relay for asynchronous persistence.
///
/// # Endpoint
///
/// `POST /ads/click/relay`
///
/// Runs the same admission checks as [`record_click_handler`], then publishes
/// the event. A 202 means the broker has the event; a partition worker writes
/// it later.
///
/// # Response Codes
///
/// - **202 Accepted**: `{"status": "Click accepted"}`
/// - **400 / 404 / 429**: as for the synchronous path
/// - **503 Service Unavailable**: database or relay unreachable
pub async fn relay_click_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ClickStatusResponse>), AppError> {
    let event = click_event(addr, body)?;
    let click = state.click_service.admit(event).await?;
    state.relay.publish(&ClickEvent::from(click)).await?;
    Ok((StatusCode::ACCEPTED, Json(ClickStatusResponse::ACCEPTED)))
}

fn click_event(
    addr: SocketAddr,
    body: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<ClickEvent, AppError> {
    let Json(request) = body.map_err(|e| {
        AppError::bad_request("invalid request body", json!({ "reason": e.body_text() }))
    })?;
    request.validate()?;

    Ok(ClickEvent::received(
        request.ad_id,
        addr.ip(),
        request.playback_time,
    ))
}
