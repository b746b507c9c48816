//! Blob metadata store seam.
//!
//! The metrics subsystem only ever issues one read against the store: "how many
//! blobs are currently in status X". Backends implement [`BlobMetadataStore`];
//! [`MemoryBlobMetadataStore`] is an in-process backend for local runs and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::status::BlobStatus;

/// Read-only view of blob metadata used by live collectors.
///
/// Dropping the returned future cancels the query; implementations must not
/// leave partial state behind when that happens.
#[async_trait]
pub trait BlobMetadataStore: Send + Sync {
    /// Number of blobs currently in `status`.
    async fn count_by_status(&self, status: BlobStatus) -> Result<u64>;
}

/// In-memory store keyed by blob id.
#[derive(Default)]
pub struct MemoryBlobMetadataStore {
    blobs: DashMap<String, BlobStatus>,
}

impl MemoryBlobMetadataStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
        }
    }

    /// Insert or move a blob to `status`.
    pub fn put(&self, blob_key: impl Into<String>, status: BlobStatus) {
        self.blobs.insert(blob_key.into(), status);
    }

    pub fn remove(&self, blob_key: &str) -> Option<BlobStatus> {
        self.blobs.remove(blob_key).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobMetadataStore for MemoryBlobMetadataStore {
    async fn count_by_status(&self, status: BlobStatus) -> Result<u64> {
        let n = self.blobs.iter().filter(|e| *e.value() == status).count();
        Ok(n as u64)
    }
}
