//! Pool observability.
//!
//! Counters for submissions, dispositions, purges and panics, plus a
//! histogram of callback latency. Logging goes through `tracing`.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
