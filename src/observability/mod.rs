//! Observability
//!
//! Structured logging and operational counters. Logs are synchronous,
//! one JSON line per event with deterministic key ordering, written to
//! stderr and to a rotating plain-text file sink. Metrics are exact
//! monotonic counters, reset only on process start.

mod logger;
mod metrics;

pub use logger::{LogLevel, Logger};
pub use metrics::MetricsRegistry;
