//! Metrics exporter server.
//!
//! Runs as its own background task. A bind or serve failure is logged and
//! leaves the rest of the process running without metrics.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dataapi_core::error::Result;

use crate::app_state::AppState;
use crate::config::MetricsConfig;
use crate::registry::MetricsRegistry;
use crate::router;

pub struct ExporterServer {
    registry: Arc<MetricsRegistry>,
    http_port: u16,
}

impl ExporterServer {
    pub fn new(registry: Arc<MetricsRegistry>, http_port: u16) -> Self {
        Self {
            registry,
            http_port,
        }
    }

    /// Start the exporter when `cfg.enable_metrics` is set.
    ///
    /// Returns `None` without parsing the port or binding anything when
    /// metrics are disabled.
    pub fn start_if_enabled(
        cfg: &MetricsConfig,
        registry: Arc<MetricsRegistry>,
    ) -> Result<Option<JoinHandle<()>>> {
        if !cfg.enable_metrics {
            tracing::info!("metrics disabled, exporter not started");
            return Ok(None);
        }
        let port = cfg.port()?;
        Ok(Some(Self::new(registry, port).start()))
    }

    /// Bind all interfaces on the configured port and serve scrapes in a
    /// spawned task.
    pub fn start(self) -> JoinHandle<()> {
        let port = self.http_port;
        tracing::info!(port, "starting metrics server");

        tokio::spawn(async move {
            let listener = match bind_any(port).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(port, error = %e, "metrics server failed to bind");
                    return;
                }
            };
            if let Err(e) = self.serve(listener).await {
                tracing::error!(port, error = %e, "metrics server failed");
            }
        })
    }

    /// Serve scrapes on an already bound listener until the server fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let app = router::build_router(AppState::new(self.registry));
        axum::serve(listener, app).await
    }
}

/// `[::]:port` (dual-stack where the host allows it), else `0.0.0.0:port`.
async fn bind_any(port: u16) -> std::io::Result<TcpListener> {
    let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    match TcpListener::bind(v6).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            tracing::debug!(%v6, error = %e, "ipv6 bind failed, trying ipv4");
            TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
        }
    }
}
