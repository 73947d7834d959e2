//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence, counters and the relay.
//!
//! # Modules
//!
//! - [`counter`] - Aggregate click counters (Redis and in-memory implementations)
//! - [`persistence`] - PostgreSQL repository implementations
//! - [`relay`] - Partitioned at-least-once broker (Redis Streams and in-memory)

pub mod counter;
pub mod persistence;
pub mod relay;
