//! Live blob-status collector.
//!
//! Queries the metadata store once per scrape for the number of blobs in a
//! given status. Nothing is recorded between scrapes, so a failed query leaves
//! the metric absent from that scrape instead of reporting a stale count.

use std::sync::Arc;

use async_trait::async_trait;
use dataapi_core::{BlobMetadataStore, BlobStatus};

use crate::collector::{Collector, Desc, MetricKind};
use crate::snapshot::{MetricFamily, Series, SeriesValue};

pub const BLOB_STATUS_METRIC: &str = "dynamodb_blob_metadata_status_count";

pub struct BlobStatusCollector {
    store: Arc<dyn BlobMetadataStore>,
    status: BlobStatus,
    desc: Desc,
}

impl BlobStatusCollector {
    /// Collector for blobs still in [`BlobStatus::Processing`].
    pub fn new(store: Arc<dyn BlobMetadataStore>) -> Self {
        Self::with_status(store, BlobStatus::Processing)
    }

    pub fn with_status(store: Arc<dyn BlobMetadataStore>, status: BlobStatus) -> Self {
        Self {
            store,
            status,
            desc: Desc::new(
                "",
                BLOB_STATUS_METRIC,
                "Number of blobs with specific status in DynamoDB",
                MetricKind::Gauge,
                &["status"],
            ),
        }
    }
}

#[async_trait]
impl Collector for BlobStatusCollector {
    fn describe(&self) -> Vec<Desc> {
        vec![self.desc.clone()]
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        let count = match self.store.count_by_status(self.status).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = %self.status,
                    "failed to get count of blob metadata by status"
                );
                return Vec::new();
            }
        };

        let series = Series::new(
            &self.desc,
            &[self.status.to_string()],
            SeriesValue::Gauge(count as f64),
        );
        vec![MetricFamily::new(self.desc.clone(), vec![series])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dataapi_core::{DataApiError, MemoryBlobMetadataStore, Result};

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BlobMetadataStore for CountingStore {
        async fn count_by_status(&self, _status: BlobStatus) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(DataApiError::Store("table unavailable".into()));
            }
            Ok(7)
        }
    }

    #[tokio::test]
    async fn emits_one_gauge_labeled_by_status() {
        let store = Arc::new(MemoryBlobMetadataStore::new());
        store.put("a", BlobStatus::Processing);
        store.put("b", BlobStatus::Processing);
        store.put("c", BlobStatus::Confirmed);

        let collector = BlobStatusCollector::new(store.clone());
        let families = collector.collect().await;
        assert_eq!(families.len(), 1);
        let series = &families[0].series;
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].labels, vec![("status".to_string(), "Processing".to_string())]);
        assert_eq!(series[0].value, SeriesValue::Gauge(2.0));

        store.put("c", BlobStatus::Processing);
        let families = collector.collect().await;
        assert_eq!(families[0].series[0].value, SeriesValue::Gauge(3.0));
    }

    #[tokio::test]
    async fn one_query_per_collect() {
        let store = Arc::new(CountingStore::default());
        let collector = BlobStatusCollector::new(store.clone());
        let _ = collector.describe();
        assert_eq!(store.calls.load(Ordering::Relaxed), 0);

        collector.collect().await;
        collector.collect().await;
        assert_eq!(store.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn failed_query_emits_nothing() {
        let store = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let collector = BlobStatusCollector::with_status(store, BlobStatus::Dispersing);
        assert!(collector.collect().await.is_empty());
        assert_eq!(collector.describe()[0].name, BLOB_STATUS_METRIC);
    }
}
