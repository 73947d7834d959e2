//! Admission control: field validation, existence check and per-source rate limit.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::NewClick;
use crate::domain::repositories::{AdRepository, ClickRepository};
use crate::error::AppError;
use crate::resilience::{BreakerRegistry, Dependency};

/// Longest accepted playback duration, in seconds.
pub const MAX_PLAYBACK_SECONDS: u16 = 3600;

/// Longest accepted advertisement id, in bytes.
pub const MAX_AD_ID_LEN: usize = 128;

/// Per-source click ceiling over a trailing window.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// A source is rejected once its recent count exceeds this value.
    pub max_clicks: i64,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_clicks: 30,
            window: Duration::from_secs(3600),
        }
    }
}

/// The gate every click passes before it may be persisted.
///
/// Checks run in a fixed order and stop at the first failure:
///
/// 1. advertisement id is non-empty, at most [`MAX_AD_ID_LEN`] bytes and free
///    of control characters
/// 2. timestamp is set
/// 3. source address is a valid IP literal
/// 4. playback duration is within `0..=3600`
/// 5. the advertisement exists
/// 6. the source is under its rate limit
///
/// Steps 5 and 6 query the durable store through the database breaker. The
/// rate check is read-then-decide, so concurrent bursts from one source may
/// briefly overshoot the ceiling.
pub struct AdmissionControl {
    ads: Arc<dyn AdRepository>,
    clicks: Arc<dyn ClickRepository>,
    breakers: Arc<BreakerRegistry>,
    rate_limit: RateLimitPolicy,
}

impl AdmissionControl {
    pub fn new(
        ads: Arc<dyn AdRepository>,
        clicks: Arc<dyn ClickRepository>,
        breakers: Arc<BreakerRegistry>,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        Self {
            ads,
            clicks,
            breakers,
            rate_limit,
        }
    }

    /// Runs the field checks (steps 1-4). Performs no I/O.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] naming the first offending field.
    pub fn validate(event: &ClickEvent) -> Result<NewClick, AppError> {
        if event.ad_id.is_empty() {
            return Err(AppError::bad_request(
                "missing advertisement id",
                json!({ "field": "ad_id" }),
            ));
        }
        if event.ad_id.len() > MAX_AD_ID_LEN || event.ad_id.chars().any(char::is_control) {
            return Err(AppError::bad_request(
                "invalid advertisement id",
                json!({ "field": "ad_id", "max_length": MAX_AD_ID_LEN }),
            ));
        }

        let timestamp = event
            .timestamp
            .filter(|ts| *ts != DateTime::<Utc>::UNIX_EPOCH)
            .ok_or_else(|| {
                AppError::bad_request("invalid timestamp", json!({ "field": "timestamp" }))
            })?;

        let ip = event.ip.parse::<IpAddr>().map_err(|_| {
            AppError::bad_request(
                "invalid source address",
                json!({ "field": "ip", "value": event.ip }),
            )
        })?;

        let playback_time = u16::try_from(event.playback_time)
            .ok()
            .filter(|secs| *secs <= MAX_PLAYBACK_SECONDS)
            .ok_or_else(|| {
                AppError::bad_request(
                    "invalid playback duration",
                    json!({
                        "field": "playback_time",
                        "value": event.playback_time,
                        "min": 0,
                        "max": MAX_PLAYBACK_SECONDS,
                    }),
                )
            })?;

        Ok(NewClick {
            ad_id: event.ad_id.clone(),
            timestamp,
            ip,
            playback_time,
        })
    }

    /// Step 5: the advertisement must exist.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if there is no such advertisement.
    /// - [`AppError::Dependency`] if the store is unreachable or its breaker is open.
    pub async fn check_exists(&self, ad_id: &str) -> Result<(), AppError> {
        let exists = self
            .breakers
            .get(Dependency::Database)
            .call_with(|| self.ads.exists(ad_id), AppError::is_caller_fault)
            .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::not_found(
                "advertisement not found",
                json!({ "ad_id": ad_id }),
            ))
        }
    }

    /// Step 6: the source must not exceed its click ceiling.
    ///
    /// # Errors
    ///
    /// - [`AppError::RateLimited`] if the recent count is above the ceiling.
    /// - [`AppError::Dependency`] if the store is unreachable or its breaker is open.
    pub async fn check_rate(&self, ip: IpAddr) -> Result<(), AppError> {
        let window = self.rate_limit.window;
        let recent = self
            .breakers
            .get(Dependency::Database)
            .call_with(
                || self.clicks.count_recent_by_ip(ip, window),
                AppError::is_caller_fault,
            )
            .await?;

        if recent > self.rate_limit.max_clicks {
            return Err(AppError::rate_limited(
                "rate limit exceeded",
                json!({
                    "ip": ip.to_string(),
                    "recent_clicks": recent,
                    "max_clicks": self.rate_limit.max_clicks,
                    "window_seconds": window.as_secs(),
                }),
            ));
        }
        Ok(())
    }
}
