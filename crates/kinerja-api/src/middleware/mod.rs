//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: in-process request and error counters.

pub mod metrics;
pub mod tracing_layer;
