//! Asynchronous click relay transport.
//!
//! Provides the [`ClickBroker`] trait with two implementations:
//! - [`RedisStreamBroker`] - Redis Streams with consumer groups (production)
//! - [`InMemoryBroker`] - Bounded tokio channels (development and tests)

mod in_memory;
mod redis_stream;
mod service;

pub use in_memory::InMemoryBroker;
pub use redis_stream::{RedisStreamBroker, RedisStreamSettings};
pub use service::{
    ClickBroker, DEFAULT_REDELIVERY_AFTER, Delivery, PartitionConsumer, RedeliverySchedule,
    RelayError, RelayResult, partition_for,
};
