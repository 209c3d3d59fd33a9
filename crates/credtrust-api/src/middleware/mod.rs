//! # Middleware
//!
//! - `metrics` counts responses by status class.
//! - `rate_limit` holds the fixed-window limiter. It is applied by the
//!   orchestrator, per operation class, rather than as a blanket layer.
//! - `tracing_layer` builds the per-request trace span layer.

pub mod metrics;
pub mod rate_limit;
pub mod tracing_layer;
