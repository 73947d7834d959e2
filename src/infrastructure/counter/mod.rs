//! Aggregate click counters.
//!
//! Provides a [`CounterStore`] trait with two implementations:
//! - [`RedisCounter`] - Production Redis-backed counters
//! - [`InMemoryCounter`] - Process-local fallback for development and tests

mod memory_counter;
mod redis_counter;
mod service;

pub use memory_counter::InMemoryCounter;
pub use redis_counter::RedisCounter;
pub use service::{CounterError, CounterResult, CounterStore};

#[cfg(test)]
pub use service::MockCounterStore;
