//! Counter store trait and error types.

use async_trait::async_trait;

use crate::error::AppError;

/// Errors that can occur during counter operations.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("Counter connection error: {0}")]
    ConnectionError(String),
    #[error("Counter operation error: {0}")]
    OperationError(String),
}

impl From<CounterError> for AppError {
    fn from(e: CounterError) -> Self {
        AppError::dependency("counter", e.to_string())
    }
}

/// Result type for counter operations.
pub type CounterResult<T> = Result<T, CounterError>;

/// Monotonic per-advertisement click counters.
///
/// Increments are atomic at the store, so callers never lock around them. The
/// counters are eventually consistent with the durable click log and may
/// under-count when an increment fails after the click was persisted.
///
/// # Implementations
///
/// - [`crate::infrastructure::counter::RedisCounter`] - Redis `INCR`/`GET`
/// - [`crate::infrastructure::counter::InMemoryCounter`] - Process-local map
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter for `ad_id`, creating it at 1.
    ///
    /// Returns the new value.
    ///
    /// # Errors
    ///
    /// Errors are propagated so the caller's breaker can observe them.
    async fn increment(&self, ad_id: &str) -> CounterResult<i64>;

    /// Reads the counter for `ad_id`.
    ///
    /// A missing counter means zero clicks and yields `Ok(0)`.
    async fn get(&self, ad_id: &str) -> CounterResult<i64>;

    /// Checks if the counter backend is reachable.
    async fn health_check(&self) -> bool;
}
