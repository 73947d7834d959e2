//! Raw click event as received at the ingestion edge or read from the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// An unvalidated click on an advertisement.
///
/// The edge stamps `timestamp` and `ip` from the server side; neither is ever
/// taken from the client. Every field may still be malformed when the event
/// arrives through the relay, which is why all of them default on decode and
/// are checked by [`crate::application::services::AdmissionControl`] before
/// anything is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default)]
    pub ad_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ip: String,
    /// Playback duration in seconds.
    #[serde(default)]
    pub playback_time: i64,
}

impl ClickEvent {
    /// Creates an event stamped with the current time and the peer address.
    pub fn received(ad_id: impl Into<String>, ip: IpAddr, playback_time: i64) -> Self {
        Self {
            ad_id: ad_id.into(),
            timestamp: Some(Utc::now()),
            ip: ip.to_string(),
            playback_time,
        }
    }

    /// Serializes the event for the relay.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parses a relay payload.
    pub fn decode(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}
