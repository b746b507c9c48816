//! Async runtime internals.
//!
//! Samples the tokio runtime the scrape runs on. Outside a runtime nothing is
//! collected.

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::collector::{Collector, Desc, MetricKind};
use crate::snapshot::{MetricFamily, Series, SeriesValue};

pub struct RuntimeCollector {
    workers: Desc,
    alive_tasks: Desc,
    global_queue_depth: Desc,
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeCollector {
    pub fn new() -> Self {
        let gauge = |name, help| Desc::new("tokio_runtime", name, help, MetricKind::Gauge, &[]);
        Self {
            workers: gauge("workers", "Number of worker threads used by the runtime."),
            alive_tasks: gauge("alive_tasks", "Number of alive tasks in the runtime."),
            global_queue_depth: gauge(
                "global_queue_depth",
                "Number of tasks currently scheduled in the runtime's global queue.",
            ),
        }
    }
}

#[async_trait]
impl Collector for RuntimeCollector {
    fn describe(&self) -> Vec<Desc> {
        vec![
            self.workers.clone(),
            self.alive_tasks.clone(),
            self.global_queue_depth.clone(),
        ]
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        let Ok(handle) = Handle::try_current() else {
            return Vec::new();
        };
        let m = handle.metrics();
        [
            (&self.workers, m.num_workers()),
            (&self.alive_tasks, m.num_alive_tasks()),
            (&self.global_queue_depth, m.global_queue_depth()),
        ]
        .into_iter()
        .map(|(desc, v)| {
            MetricFamily::new(
                desc.clone(),
                vec![Series::new(desc, &[], SeriesValue::Gauge(v as f64))],
            )
        })
        .collect()
    }
}
