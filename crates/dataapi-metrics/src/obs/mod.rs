//! Lightweight in-process metric primitives.
//!
//! Series are stored as atomics (summaries behind a per-series mutex) and
//! turned into [`crate::snapshot::MetricFamily`] values at scrape time.

pub mod metrics;
pub mod quantile;

pub use metrics::{CounterVec, Gauge, GaugeVec, SummaryOpts, SummaryVec};
pub use quantile::Objective;
