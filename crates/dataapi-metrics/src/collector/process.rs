//! Process resource usage.
//!
//! Reads `/proc/self` on Linux. On other platforms the families are still
//! described but nothing is collected. Each value is read independently; an
//! unreadable source drops only that family.

use async_trait::async_trait;

use crate::collector::{Collector, Desc, MetricKind};
use crate::snapshot::{MetricFamily, Series, SeriesValue};

/// Kernel clock ticks per second assumed for `/proc/self/stat` times.
const CLOCK_TICKS: f64 = 100.0;

pub struct ProcessCollector {
    cpu_seconds: Desc,
    open_fds: Desc,
    max_fds: Desc,
    virtual_memory: Desc,
    resident_memory: Desc,
    start_time: Desc,
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessCollector {
    pub fn new() -> Self {
        let gauge = |name, help| Desc::new("process", name, help, MetricKind::Gauge, &[]);
        Self {
            cpu_seconds: Desc::new(
                "process",
                "cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
                MetricKind::Counter,
                &[],
            ),
            open_fds: gauge("open_fds", "Number of open file descriptors."),
            max_fds: gauge("max_fds", "Maximum number of open file descriptors."),
            virtual_memory: gauge("virtual_memory_bytes", "Virtual memory size in bytes."),
            resident_memory: gauge("resident_memory_bytes", "Resident memory size in bytes."),
            start_time: gauge(
                "start_time_seconds",
                "Start time of the process since unix epoch in seconds.",
            ),
        }
    }
}

fn single(desc: &Desc, value: SeriesValue) -> MetricFamily {
    MetricFamily::new(desc.clone(), vec![Series::new(desc, &[], value)])
}

#[async_trait]
impl Collector for ProcessCollector {
    fn describe(&self) -> Vec<Desc> {
        vec![
            self.cpu_seconds.clone(),
            self.open_fds.clone(),
            self.max_fds.clone(),
            self.virtual_memory.clone(),
            self.resident_memory.clone(),
            self.start_time.clone(),
        ]
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        self.read_proc()
    }
}

impl ProcessCollector {
    #[cfg(target_os = "linux")]
    fn read_proc(&self) -> Vec<MetricFamily> {
        use std::fs;

        let mut out = Vec::new();

        let stat = fs::read_to_string("/proc/self/stat")
            .ok()
            .and_then(|s| ProcStat::parse(&s));
        match &stat {
            Some(stat) => {
                out.push(single(&self.cpu_seconds, SeriesValue::Counter(stat.cpu_seconds())));
                out.push(single(&self.virtual_memory, SeriesValue::Gauge(stat.vsize as f64)));
            }
            None => tracing::debug!("process stat unavailable"),
        }

        if let Some(rss_kb) = fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| parse_status_kb(&s, "VmRSS"))
        {
            out.push(single(&self.resident_memory, SeriesValue::Gauge((rss_kb * 1024) as f64)));
        }

        match fs::read_dir("/proc/self/fd") {
            Ok(dir) => {
                let n = dir.filter(|e| e.is_ok()).count();
                out.push(single(&self.open_fds, SeriesValue::Gauge(n as f64)));
            }
            Err(e) => tracing::debug!(error = %e, "fd listing unavailable"),
        }

        if let Some(max) = fs::read_to_string("/proc/self/limits")
            .ok()
            .and_then(|s| parse_max_fds(&s))
        {
            out.push(single(&self.max_fds, SeriesValue::Gauge(max)));
        }

        if let (Some(stat), Some(btime)) = (
            &stat,
            fs::read_to_string("/proc/stat").ok().and_then(|s| parse_btime(&s)),
        ) {
            let start = btime as f64 + stat.start_ticks as f64 / CLOCK_TICKS;
            out.push(single(&self.start_time, SeriesValue::Gauge(start)));
        }

        out
    }

    #[cfg(not(target_os = "linux"))]
    fn read_proc(&self) -> Vec<MetricFamily> {
        Vec::new()
    }
}

/// Fields of `/proc/self/stat` used here.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProcStat {
    utime: u64,
    stime: u64,
    start_ticks: u64,
    vsize: u64,
}

impl ProcStat {
    fn parse(s: &str) -> Option<Self> {
        // `comm` may contain spaces and parens; fields resume after the last ')'.
        let rest = &s[s.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // fields[0] is field 3 (state) of proc(5).
        let field = |n: usize| fields.get(n - 3)?.parse::<u64>().ok();
        Some(Self {
            utime: field(14)?,
            stime: field(15)?,
            start_ticks: field(22)?,
            vsize: field(23)?,
        })
    }

    fn cpu_seconds(&self) -> f64 {
        (self.utime + self.stime) as f64 / CLOCK_TICKS
    }
}

fn parse_status_kb(s: &str, key: &str) -> Option<u64> {
    s.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        value.split_whitespace().next()?.parse().ok()
    })
}

fn parse_max_fds(s: &str) -> Option<f64> {
    let line = s.lines().find(|l| l.starts_with("Max open files"))?;
    let soft = line["Max open files".len()..].split_whitespace().next()?;
    if soft == "unlimited" {
        return Some(f64::INFINITY);
    }
    soft.parse::<u64>().ok().map(|v| v as f64)
}

fn parse_btime(s: &str) -> Option<u64> {
    s.lines()
        .find_map(|l| l.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}
