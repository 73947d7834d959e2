//! HTTP API layer.
//!
//! # Modules
//!
//! - [`dto`] - Request/response bodies
//! - [`handlers`] - HTTP request handlers
//! - [`middleware`] - Tracing and edge throttling
//! - [`routes`] - Route table

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
