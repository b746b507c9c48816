//! Shared state for the exporter's HTTP handlers.

use std::sync::Arc;

use crate::registry::MetricsRegistry;

#[derive(Clone)]
pub struct AppState {
    registry: Arc<MetricsRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.registry)
    }
}
