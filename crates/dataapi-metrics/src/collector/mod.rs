//! Two-phase collector contract.
//!
//! Every metric source registered with the [`crate::registry::MetricsRegistry`]
//! implements [`Collector`]: `describe` declares the families it can produce
//! (static, no I/O), `collect` computes current values when a scrape arrives.

pub mod blob_status;
pub mod process;
pub mod runtime;

use async_trait::async_trait;

use crate::snapshot::MetricFamily;

pub use blob_status::BlobStatusCollector;
pub use process::ProcessCollector;
pub use runtime::RuntimeCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
}

impl MetricKind {
    /// Name used on the `# TYPE` line.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        }
    }
}

/// Static shape of a metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    /// Fully-qualified name (`<namespace>_<name>`).
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl Desc {
    pub fn new(namespace: &str, name: &str, help: &str, kind: MetricKind, labels: &[&str]) -> Self {
        let name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{namespace}_{name}")
        };
        Self {
            name,
            help: help.to_string(),
            kind,
            label_names: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Same kind and label schema.
    pub fn is_compatible(&self, other: &Desc) -> bool {
        self.kind == other.kind && self.label_names == other.label_names
    }
}

/// A metric source rendered at scrape time.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Families this collector can emit. Must not perform I/O and must return
    /// the same list for the life of the process.
    fn describe(&self) -> Vec<Desc>;

    /// Current values. Failures are logged by the collector and surface as
    /// missing families, never as an error.
    async fn collect(&self) -> Vec<MetricFamily>;
}

/// Whether `name` is a valid metric name (`[a-zA-Z_:][a-zA-Z0-9_:]*`).
pub(crate) fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Whether `name` is a valid, non-reserved label name.
pub(crate) fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
