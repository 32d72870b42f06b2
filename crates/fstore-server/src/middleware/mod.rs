//! # Middleware Stack
//!
//! Tower middleware for the server:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: Prometheus request and store metrics.

pub mod metrics;
pub mod tracing_layer;
