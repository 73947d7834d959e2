//! PostgreSQL repository implementations.
//!
//! Concrete implementations of the domain repository traits using SQLx with
//! parameterized statements over a shared connection pool.
//!
//! # Repositories
//!
//! - [`PgAdRepository`] - Advertisement catalogue
//! - [`PgClickRepository`] - Click log and per-source rate counts

pub mod pg_ad_repository;
pub mod pg_click_repository;

pub use pg_ad_repository::PgAdRepository;
pub use pg_click_repository::PgClickRepository;
