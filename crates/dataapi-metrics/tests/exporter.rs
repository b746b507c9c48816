#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use dataapi_core::{BlobMetadataStore, BlobStatus, Code, DataApiError, MemoryBlobMetadataStore, Result};
use dataapi_metrics::config::MetricsConfig;
use dataapi_metrics::{ExporterServer, Metrics, MetricsRegistry};

/// Store whose availability can be toggled between scrapes.
struct FlakyStore {
    inner: MemoryBlobMetadataStore,
    down: AtomicBool,
}

#[async_trait]
impl BlobMetadataStore for FlakyStore {
    async fn count_by_status(&self, status: BlobStatus) -> Result<u64> {
        if self.down.load(Ordering::Relaxed) {
            return Err(DataApiError::Store("connection reset".into()));
        }
        self.inner.count_by_status(status).await
    }
}

async fn spawn_exporter(registry: MetricsRegistry) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ExporterServer::new(Arc::new(registry), addr.port());
    tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    addr
}

async fn get(addr: std::net::SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").expect("http response");
    (head.to_string(), body.to_string())
}

#[tokio::test]
async fn scrape_renders_store_and_live_metrics() {
    let store = Arc::new(FlakyStore {
        inner: MemoryBlobMetadataStore::new(),
        down: AtomicBool::new(false),
    });
    store.inner.put("blob-1", BlobStatus::Processing);
    store.inner.put("blob-2", BlobStatus::Processing);

    let metrics = Arc::new(Metrics::new());
    let registry = MetricsRegistry::with_defaults(metrics.clone(), store.clone()).unwrap();
    let addr = spawn_exporter(registry).await;

    metrics.increment_successful_request_num("FetchBlobFeed");
    metrics.observe_latency("FetchBlobFeed", 12.5);
    metrics.increment_ejection_request("urgent", Code::Ok);
    metrics.update_requested_operator_metric(&HashMap::from([(0, 3)]), &HashMap::from([(0, 0.4)]));
    metrics.update_ejection_gas_used(21_000);

    let (head, body) = get(addr, "/metrics").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("content-type: text/plain; version=0.0.4"));

    assert!(body.contains("# TYPE eigenda_dataapi_requests counter\n"));
    assert!(body.contains("eigenda_dataapi_requests{status=\"success\",method=\"FetchBlobFeed\"} 1\n"));
    assert!(body.contains("# TYPE eigenda_dataapi_latency_ms summary\n"));
    assert!(body.contains("eigenda_dataapi_latency_ms{method=\"FetchBlobFeed\",quantile=\"0.5\"} 12.5\n"));
    assert!(body.contains("eigenda_dataapi_latency_ms_count{method=\"FetchBlobFeed\"} 1\n"));
    assert!(body.contains("eigenda_dataapi_urgent_ejection_requests_total{status=\"OK\"} 1\n"));
    assert!(body.contains("eigenda_dataapi_operators_to_eject{quorum=\"0\"} 3\n"));
    assert!(body.contains("eigenda_dataapi_stake_share_to_eject{quorum=\"0\"} 0.4\n"));
    assert!(body.contains("eigenda_dataapi_ejection_gas_used 21000\n"));
    assert!(body.contains("dynamodb_blob_metadata_status_count{status=\"Processing\"} 2\n"));
    assert!(body.contains("# TYPE tokio_runtime_workers gauge\n"));
}

#[tokio::test]
async fn failing_live_query_drops_only_that_metric() {
    let store = Arc::new(FlakyStore {
        inner: MemoryBlobMetadataStore::new(),
        down: AtomicBool::new(false),
    });
    store.inner.put("blob-1", BlobStatus::Processing);

    let metrics = Arc::new(Metrics::new());
    let registry = MetricsRegistry::with_defaults(metrics.clone(), store.clone()).unwrap();
    let addr = spawn_exporter(registry).await;
    metrics.increment_failed_request_num("FetchBlob");

    let (_, body) = get(addr, "/metrics").await;
    assert!(body.contains("dynamodb_blob_metadata_status_count{status=\"Processing\"} 1\n"));

    store.down.store(true, Ordering::Relaxed);
    let (head, body) = get(addr, "/metrics").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(!body.contains("dynamodb_blob_metadata_status_count"));
    assert!(body.contains("eigenda_dataapi_requests{status=\"failed\",method=\"FetchBlob\"} 1\n"));
    assert!(body.contains("eigenda_dataapi_ejection_gas_used 0\n"));

    store.down.store(false, Ordering::Relaxed);
    store.inner.put("blob-2", BlobStatus::Processing);
    let (_, body) = get(addr, "/metrics").await;
    assert!(body.contains("dynamodb_blob_metadata_status_count{status=\"Processing\"} 2\n"));
}

#[tokio::test]
async fn only_metrics_route_is_served() {
    let registry = MetricsRegistry::with_defaults(
        Arc::new(Metrics::new()),
        Arc::new(MemoryBlobMetadataStore::new()),
    )
    .unwrap();
    let addr = spawn_exporter(registry).await;

    let (head, _) = get(addr, "/healthz").await;
    assert!(head.starts_with("HTTP/1.1 404"), "{head}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recording_is_visible_in_one_scrape() {
    let metrics = Arc::new(Metrics::new());
    let registry = MetricsRegistry::with_defaults(
        metrics.clone(),
        Arc::new(MemoryBlobMetadataStore::new()),
    )
    .unwrap();
    let addr = spawn_exporter(registry).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move {
                for _ in 0..50 {
                    metrics.increment_successful_request_num("FetchOperatorsNonSigning");
                }
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }

    let (_, body) = get(addr, "/metrics").await;
    assert!(body.contains(
        "eigenda_dataapi_requests{status=\"success\",method=\"FetchOperatorsNonSigning\"} 1000\n"
    ));
}

#[tokio::test]
async fn bind_failure_does_not_panic() {
    let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let registry = MetricsRegistry::with_defaults(
        Arc::new(Metrics::new()),
        Arc::new(MemoryBlobMetadataStore::new()),
    )
    .unwrap();
    let handle = ExporterServer::new(Arc::new(registry), port).start();
    // The task logs the bind error and returns instead of panicking.
    let joined = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("exporter task should exit after bind failure");
    assert!(joined.is_ok());
    drop(taken);
}

fn default_registry() -> Arc<MetricsRegistry> {
    Arc::new(
        MetricsRegistry::with_defaults(
            Arc::new(Metrics::new()),
            Arc::new(MemoryBlobMetadataStore::new()),
        )
        .unwrap(),
    )
}

async fn free_port() -> u16 {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    l.local_addr().unwrap().port()
}

#[tokio::test]
async fn disabled_exporter_is_never_started() {
    let port = free_port().await;
    let cfg = MetricsConfig {
        http_port: port.to_string(),
        enable_metrics: false,
    };
    let handle = ExporterServer::start_if_enabled(&cfg, default_registry()).unwrap();
    assert!(handle.is_none());

    // Nothing holds the port.
    tokio::task::yield_now().await;
    TcpListener::bind(("0.0.0.0", port)).await.expect("port must still be free");

    // An unusable port does not matter while disabled.
    let cfg = MetricsConfig {
        http_port: "abc".into(),
        enable_metrics: false,
    };
    assert!(ExporterServer::start_if_enabled(&cfg, default_registry())
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn enabled_exporter_serves_metrics() {
    let port = free_port().await;
    let cfg = MetricsConfig {
        http_port: port.to_string(),
        enable_metrics: true,
    };
    let handle = ExporterServer::start_if_enabled(&cfg, default_registry()).unwrap();
    assert!(handle.is_some());

    let addr: std::net::SocketAddr = ([127, 0, 0, 1], port).into();
    let mut connected = false;
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(connected, "exporter never accepted connections");

    let (head, body) = get(addr, "/metrics").await;
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(body.contains("# TYPE eigenda_dataapi_ejection_gas_used gauge\n"));
}

#[test]
fn enabled_exporter_with_bad_port_is_an_error() {
    let cfg = MetricsConfig {
        http_port: "0".into(),
        enable_metrics: true,
    };
    assert!(matches!(
        ExporterServer::start_if_enabled(&cfg, default_registry()),
        Err(DataApiError::Config(_))
    ));
}
