//! HTTP request handlers.
//!
//! Handlers only translate between HTTP and the application services; every
//! rule about clicks lives in [`crate::application::services`].

pub mod ads;
pub mod analytics;
pub mod clicks;
pub mod health;
pub mod metrics;

pub use ads::list_ads_handler;
pub use analytics::analytics_handler;
pub use clicks::{record_click_handler, relay_click_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
