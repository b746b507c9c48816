//! Data API metrics library.
//!
//! Wires the metric store, live and process collectors, the registry, and the
//! `/metrics` exporter. Consumed by the binary (`main.rs`) and by integration
//! tests.

pub mod app_state;
pub mod collector;
pub mod config;
pub mod metrics;
pub mod obs;
pub mod ops;
pub mod registry;
pub mod router;
pub mod server;
pub mod snapshot;

pub use metrics::{EjectionMode, Metrics, RequestOutcome};
pub use registry::MetricsRegistry;
pub use server::ExporterServer;
pub use snapshot::ScrapeSnapshot;
