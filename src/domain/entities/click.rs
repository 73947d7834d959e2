//! Admitted click ready for persistence.

use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::domain::click_event::ClickEvent;

/// A click that passed the field checks of admission control.
///
/// Unlike [`ClickEvent`], every field is typed and known to be in range, so the
/// durable store never sees an unchecked value.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClick {
    pub ad_id: String,
    pub timestamp: DateTime<Utc>,
    pub ip: IpAddr,
    pub playback_time: u16,
}

impl From<NewClick> for ClickEvent {
    fn from(click: NewClick) -> Self {
        ClickEvent {
            ad_id: click.ad_id,
            timestamp: Some(click.timestamp),
            ip: click.ip.to_string(),
            playback_time: i64::from(click.playback_time),
        }
    }
}
