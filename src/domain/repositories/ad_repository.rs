//! Repository trait for advertisement lookups.

use crate::domain::entities::Advertisement;
use crate::error::AppError;
use async_trait::async_trait;

/// Read access to the advertisement catalogue.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgAdRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdRepository: Send + Sync {
    /// Returns every advertisement.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] when the database cannot be queried.
    async fn fetch_all(&self) -> Result<Vec<Advertisement>, AppError>;

    /// Checks whether an advertisement with the given id exists.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] when the database cannot be queried.
    /// A failed query is never reported as `Ok(false)`.
    async fn exists(&self, ad_id: &str) -> Result<bool, AppError>;

    /// Round-trips a trivial query. Used by the health endpoint.
    async fn health_check(&self) -> bool;
}
