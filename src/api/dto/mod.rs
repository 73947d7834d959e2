//! Data Transfer Objects for API requests and responses.

pub mod ads;
pub mod analytics;
pub mod clicks;
pub mod health;
