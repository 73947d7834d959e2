//! Business logic services for the application layer.

pub mod ad_service;
pub mod admission;
pub mod click_service;
pub mod relay_service;

pub use ad_service::AdService;
pub use admission::{AdmissionControl, MAX_AD_ID_LEN, MAX_PLAYBACK_SECONDS, RateLimitPolicy};
pub use click_service::{ClickService, IngestStage};
pub use relay_service::RelayPublisher;
