//! Top-level facade crate for the data API metrics stack.
//!
//! Re-exports core types and the metrics library so users can depend on a single crate.

pub mod core {
    pub use dataapi_core::*;
}

pub mod metrics {
    pub use dataapi_metrics::*;
}
