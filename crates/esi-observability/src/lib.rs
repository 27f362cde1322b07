//! Observability for ESI edge assembly.
//!
//! This crate provides:
//! - `ScopeLogger` - Per-scope `tracing` dispatch built from `log_file`/`log_level`
//! - `PageMetrics` - Per-page fragment timings and outcomes

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
