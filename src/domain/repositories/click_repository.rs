//! Repository trait for durable click records.

use crate::domain::entities::NewClick;
use crate::error::AppError;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Durable storage for click records.
///
/// `save` is a plain insert: it does not deduplicate, so replaying an event
/// produces a second row.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgClickRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_clicks.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickRepository: Send + Sync {
    /// Counts clicks recorded from `ip` within the trailing `window`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] on database errors.
    async fn count_recent_by_ip(&self, ip: IpAddr, window: Duration) -> Result<i64, AppError>;

    /// Inserts a click record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] on database errors.
    async fn save(&self, click: &NewClick) -> Result<(), AppError>;
}
