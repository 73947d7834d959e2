//! Repository trait definitions for the domain layer.
//!
//! Together these traits form the durable store gateway: the advertisement
//! catalogue and the click log. Implementations live in
//! `crate::infrastructure::persistence`; mock implementations are generated via
//! `mockall` for unit tests.
//!
//! # Available Repositories
//!
//! - [`AdRepository`] - Advertisement listing and existence checks
//! - [`ClickRepository`] - Click inserts and per-source rate counts

pub mod ad_repository;
pub mod click_repository;

pub use ad_repository::AdRepository;
pub use click_repository::ClickRepository;

#[cfg(test)]
pub use ad_repository::MockAdRepository;
#[cfg(test)]
pub use click_repository::MockClickRepository;
