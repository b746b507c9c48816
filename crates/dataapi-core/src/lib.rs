//! Data API core: error types, blob and status-code vocabularies, and the
//! metadata store seam.
//!
//! This crate carries no HTTP or metrics dependencies so the store contract can
//! be implemented by any backend without pulling in the exporter.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod status;
pub mod store;

/// Shared result type.
pub use error::{DataApiError, Result};
pub use status::{BlobStatus, Code};
pub use store::{BlobMetadataStore, MemoryBlobMetadataStore};
