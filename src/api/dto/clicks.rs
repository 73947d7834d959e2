//! DTOs for click submission.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /ads/click` and `POST /ads/click/relay`.
///
/// Timestamp and source address are not client-supplied; the server stamps
/// them. Missing fields deserialize to their zero values and are rejected by
/// admission control with a field-specific message.
#[derive(Debug, Deserialize, Validate)]
pub struct ClickRequest {
    /// Bounded here so oversized ids are refused before any service call.
    #[serde(default)]
    #[validate(length(max = 128, message = "advertisement id is too long"))]
    pub ad_id: String,

    /// Seconds of playback before the click.
    #[serde(default)]
    pub playback_time: i64,
}

/// Acknowledgement returned for an accepted click.
#[derive(Debug, Serialize)]
pub struct ClickStatusResponse {
    pub status: &'static str,
}

impl ClickStatusResponse {
    pub const RECORDED: Self = Self {
        status: "Click recorded",
    };
    pub const ACCEPTED: Self = Self {
        status: "Click accepted",
    };
}
