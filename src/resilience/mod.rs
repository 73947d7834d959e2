//! Fault isolation for downstream calls.
//!
//! - [`circuit_breaker`] - Per-dependency Closed/Open/Half-Open state machine
//! - [`registry`] - The set of breakers shared across the process

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{
    BreakerError, BreakerSettings, BreakerState, CircuitBreaker, Dependency, StateChange,
};
pub use registry::BreakerRegistry;
