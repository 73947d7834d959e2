//! HTTP middleware: request tracing, request metrics and the per-peer edge throttle.

pub mod http_metrics;
pub mod rate_limit;
pub mod tracing;
