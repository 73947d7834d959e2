//! Application layer services implementing business logic.
//!
//! Services sit between the HTTP edge and the infrastructure adapters. Every
//! call to an external store goes through the matching circuit breaker in
//! [`crate::resilience::BreakerRegistry`].
//!
//! # Available Services
//!
//! - [`services::ClickService`] - Ingestion coordinator (admission, persist, count)
//! - [`services::AdmissionControl`] - Field checks, existence and rate limiting
//! - [`services::AdService`] - Advertisement listing
//! - [`services::RelayPublisher`] - Publishing clicks onto the relay channel

pub mod services;
