//! Data API metrics exporter.
//!
//! Loads `dataapi.yaml` (or the path given as the first argument), builds the
//! registry and, when enabled, serves `/metrics` until interrupted.

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use dataapi_core::error::{DataApiError, Result};
use dataapi_core::MemoryBlobMetadataStore;
use dataapi_metrics::{config, ExporterServer, Metrics, MetricsRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "dataapi.yaml".to_string());
    let cfg = config::load_from_file(&path)?;

    let store = Arc::new(MemoryBlobMetadataStore::new());
    let metrics = Arc::new(Metrics::new());
    let registry = Arc::new(MetricsRegistry::with_defaults(metrics, store)?);

    let _exporter = ExporterServer::start_if_enabled(&cfg.metrics, registry)?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DataApiError::Internal(format!("signal handler failed: {e}")))?;
    tracing::info!("shutting down");
    Ok(())
}
