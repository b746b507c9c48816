//! Metrics registry.
//!
//! Composes the metric store, live collectors and process/runtime collectors
//! into one scrapeable unit. Registration happens once at startup; a
//! conflicting declaration is a programming error and is returned so the
//! process can refuse to start.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dataapi_core::error::{DataApiError, Result};
use dataapi_core::BlobMetadataStore;

use crate::collector::{
    is_valid_label_name, is_valid_metric_name, BlobStatusCollector, Collector, Desc, MetricKind,
    ProcessCollector, RuntimeCollector,
};
use crate::metrics::Metrics;
use crate::snapshot::ScrapeSnapshot;

#[derive(Default)]
pub struct MetricsRegistry {
    collectors: Vec<Arc<dyn Collector>>,
    descs: HashMap<String, Desc>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the process and runtime collectors, the blob-status live
    /// collector over `store`, and `metrics`.
    pub fn with_defaults(metrics: Arc<Metrics>, store: Arc<dyn BlobMetadataStore>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ProcessCollector::new()))?;
        registry.register(Arc::new(RuntimeCollector::new()))?;
        registry.register(Arc::new(BlobStatusCollector::new(store)))?;
        registry.register(metrics)?;
        Ok(registry)
    }

    /// Add a collector. Nothing is registered if any of its families is
    /// invalid or already declared by another collector.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<()> {
        let descs = collector.describe();
        {
            let mut seen: HashMap<&str, &Desc> = HashMap::new();
            for desc in &descs {
                validate(desc)?;
                let existing = self
                    .descs
                    .get(&desc.name)
                    .or_else(|| seen.get(desc.name.as_str()).copied());
                if let Some(existing) = existing {
                    let reason = if existing.is_compatible(desc) {
                        "already registered".to_string()
                    } else {
                        format!(
                            "registered as {} {:?}, declared as {} {:?}",
                            existing.kind.as_str(),
                            existing.label_names,
                            desc.kind.as_str(),
                            desc.label_names
                        )
                    };
                    return Err(DataApiError::Registration {
                        name: desc.name.clone(),
                        reason,
                    });
                }
                seen.insert(desc.name.as_str(), desc);
            }
        }

        for desc in descs {
            self.descs.insert(desc.name.clone(), desc);
        }
        self.collectors.push(collector);
        Ok(())
    }

    /// Declared families, keyed by name.
    pub fn descs(&self) -> impl Iterator<Item = &Desc> {
        self.descs.values()
    }

    /// Describe then collect every registered collector into a fresh snapshot.
    ///
    /// A family the collector did not declare, or one already emitted during
    /// this scrape, is logged and left out.
    pub async fn gather(&self) -> ScrapeSnapshot {
        let mut families = Vec::new();
        let mut emitted: HashSet<String> = HashSet::new();
        for collector in &self.collectors {
            let declared = collector.describe();
            for family in collector.collect().await {
                let name = family.desc.name.as_str();
                if !declared.iter().any(|d| *d == family.desc) {
                    tracing::error!(metric = %name, "collected family was not described, dropped");
                    continue;
                }
                if !emitted.insert(name.to_string()) {
                    tracing::error!(metric = %name, "family collected more than once, dropped");
                    continue;
                }
                families.push(family);
            }
        }
        ScrapeSnapshot::new(families)
    }
}

fn validate(desc: &Desc) -> Result<()> {
    let invalid = |reason: String| DataApiError::Registration {
        name: desc.name.clone(),
        reason,
    };
    if !is_valid_metric_name(&desc.name) {
        return Err(invalid("invalid metric name".into()));
    }
    for (i, label) in desc.label_names.iter().enumerate() {
        if !is_valid_label_name(label) {
            return Err(invalid(format!("invalid label name {label:?}")));
        }
        if desc.kind == MetricKind::Summary && label == "quantile" {
            return Err(invalid("summary cannot use the quantile label".into()));
        }
        if desc.label_names[..i].contains(label) {
            return Err(invalid(format!("duplicate label name {label:?}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dataapi_core::MemoryBlobMetadataStore;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::snapshot::{MetricFamily, Series, SeriesValue};

    struct Static(Vec<Desc>);

    #[async_trait]
    impl Collector for Static {
        fn describe(&self) -> Vec<Desc> {
            self.0.clone()
        }

        async fn collect(&self) -> Vec<MetricFamily> {
            Vec::new()
        }
    }

    fn gauge(name: &str, labels: &[&str]) -> Arc<dyn Collector> {
        Arc::new(Static(vec![Desc::new("", name, "h", MetricKind::Gauge, labels)]))
    }

    #[test]
    fn incompatible_redeclaration_is_rejected() {
        let mut r = MetricsRegistry::new();
        r.register(gauge("queue_depth", &["status"])).unwrap();

        let err = r.register(gauge("queue_depth", &["quorum"])).unwrap_err();
        assert!(matches!(err, DataApiError::Registration { ref name, .. } if name == "queue_depth"));
        assert_eq!(r.collectors.len(), 1);
    }

    #[test]
    fn identical_redeclaration_is_rejected() {
        let mut r = MetricsRegistry::new();
        r.register(gauge("queue_depth", &["status"])).unwrap();
        assert!(r.register(gauge("queue_depth", &["status"])).is_err());
    }

    #[test]
    fn failed_registration_is_atomic() {
        let mut r = MetricsRegistry::new();
        r.register(gauge("b", &[])).unwrap();
        let both = Arc::new(Static(vec![
            Desc::new("", "a", "h", MetricKind::Gauge, &[]),
            Desc::new("", "b", "h", MetricKind::Counter, &[]),
        ]));
        assert!(r.register(both).is_err());
        assert!(r.register(gauge("a", &[])).is_ok());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut r = MetricsRegistry::new();
        assert!(r.register(gauge("bad-name", &[])).is_err());
        assert!(r.register(gauge("ok", &["__x"])).is_err());
        assert!(r.register(gauge("ok", &["a", "a"])).is_err());
        let summary = Arc::new(Static(vec![Desc::new("", "s", "h", MetricKind::Summary, &["quantile"])]));
        assert!(r.register(summary).is_err());
    }

    /// Declares only `declared`, but emits it and `extra` twice each.
    struct Misbehaving {
        declared: Desc,
        extra: Desc,
        describes: AtomicUsize,
    }

    #[async_trait]
    impl Collector for Misbehaving {
        fn describe(&self) -> Vec<Desc> {
            self.describes.fetch_add(1, Ordering::Relaxed);
            vec![self.declared.clone()]
        }

        async fn collect(&self) -> Vec<MetricFamily> {
            let one = |d: &Desc| {
                MetricFamily::new(d.clone(), vec![Series::new(d, &[], SeriesValue::Counter(1.0))])
            };
            vec![one(&self.declared), one(&self.declared), one(&self.extra), one(&self.extra)]
        }
    }

    #[tokio::test]
    async fn gather_keeps_only_declared_families_once() {
        let c = Arc::new(Misbehaving {
            declared: Desc::new("", "declared_only", "h", MetricKind::Counter, &[]),
            extra: Desc::new("", "dup_family", "h", MetricKind::Counter, &[]),
            describes: AtomicUsize::new(0),
        });
        let mut r = MetricsRegistry::new();
        r.register(c.clone()).unwrap();
        let registered = c.describes.load(Ordering::Relaxed);

        let out = r.gather().await.render();
        assert_eq!(c.describes.load(Ordering::Relaxed), registered + 1);
        assert_eq!(out.matches("# TYPE declared_only counter\n").count(), 1);
        assert!(!out.contains("dup_family"));
    }

    #[tokio::test]
    async fn defaults_register_and_gather() {
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(MemoryBlobMetadataStore::new());
        let r = MetricsRegistry::with_defaults(metrics.clone(), store).unwrap();
        assert!(r.descs().any(|d| d.name == "dynamodb_blob_metadata_status_count"));

        metrics.increment_successful_request_num("FetchBlob");
        let snap = r.gather().await;
        assert_eq!(
            snap.value(
                "eigenda_dataapi_requests",
                &[("status", "success"), ("method", "FetchBlob")]
            ),
            Some(1.0)
        );
        assert_eq!(
            snap.value("dynamodb_blob_metadata_status_count", &[("status", "Processing")]),
            Some(0.0)
        );
    }

    #[test]
    fn metrics_cannot_be_registered_twice() {
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(MemoryBlobMetadataStore::new());
        let mut r = MetricsRegistry::with_defaults(metrics.clone(), store).unwrap();
        assert!(r.register(metrics).is_err());
    }
}
