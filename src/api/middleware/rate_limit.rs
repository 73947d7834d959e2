//! Per-peer edge throttle using a token bucket.
//!
//! This guards the HTTP edge against floods from a single address. It is
//! independent of the durable per-source click ceiling enforced by admission
//! control, which counts only recorded clicks.

use anyhow::{Context, Result};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor,
};

pub type EdgeThrottleLayer =
    GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Creates the edge throttle.
///
/// Each peer address gets a bucket of `burst` tokens refilled at
/// `per_second` tokens per second. Requests exceeding it receive
/// `429 Too Many Requests` before reaching any handler.
///
/// Keys come from the socket peer address, so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Errors
///
/// Returns an error if `per_second` or `burst` is zero.
pub fn layer(per_second: u64, burst: u32) -> Result<EdgeThrottleLayer> {
    // The builder takes the replenish period, not a rate.
    let period_ms = (1000 / per_second.max(1)).max(1);

    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(period_ms)
        .burst_size(burst)
        .finish()
        .context("EDGE_RATE_PER_SECOND and EDGE_BURST must be greater than 0")?;

    Ok(GovernorLayer::new(Arc::new(governor_conf)))
}
