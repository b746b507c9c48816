//! Labeled metric primitives.
//!
//! Counter/gauge/summary vectors with lazily created series backed by
//! `DashMap`. Series are keyed by label values in the order of the family's
//! label schema. Counters and gauges are single atomics so updates to distinct
//! series never contend and same-series updates are never lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::collector::{Desc, MetricKind};
use crate::obs::quantile::{Objective, WindowedQuantiles};
use crate::snapshot::{MetricFamily, Series, SeriesValue};

fn key(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn arity_ok(desc: &Desc, values: &[&str]) -> bool {
    if values.len() == desc.label_names.len() {
        return true;
    }
    tracing::warn!(
        metric = %desc.name,
        expected = desc.label_names.len(),
        got = values.len(),
        "label arity mismatch, update dropped"
    );
    false
}

pub struct CounterVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    pub fn new(desc: Desc) -> Self {
        debug_assert_eq!(desc.kind, MetricKind::Counter);
        Self {
            desc,
            map: DashMap::new(),
        }
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) {
        self.add(values, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, values: &[&str], v: u64) {
        if !arity_ok(&self.desc, values) {
            return;
        }
        let key = key(values);
        if let Some(counter) = self.map.get(&key) {
            counter.fetch_add(v, Ordering::Relaxed);
            return;
        }
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value, zero for a series never written.
    pub fn get(&self, values: &[&str]) -> u64 {
        self.map
            .get(&key(values))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn collect(&self) -> MetricFamily {
        let series = self
            .map
            .iter()
            .map(|r| {
                let v = r.value().load(Ordering::Relaxed) as f64;
                Series::new(&self.desc, r.key(), SeriesValue::Counter(v))
            })
            .collect();
        MetricFamily::new(self.desc.clone(), series)
    }
}

/// Gauge values are `f64` stored as raw bits.
pub struct GaugeVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl GaugeVec {
    pub fn new(desc: Desc) -> Self {
        debug_assert_eq!(desc.kind, MetricKind::Gauge);
        Self {
            desc,
            map: DashMap::new(),
        }
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Replace the series value.
    pub fn set(&self, values: &[&str], v: f64) {
        if !arity_ok(&self.desc, values) {
            return;
        }
        let key = key(values);
        if let Some(gauge) = self.map.get(&key) {
            gauge.store(v.to_bits(), Ordering::Relaxed);
            return;
        }
        self.map
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0f64.to_bits()))
            .store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, values: &[&str]) -> Option<f64> {
        self.map
            .get(&key(values))
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    pub fn collect(&self) -> MetricFamily {
        let series = self
            .map
            .iter()
            .map(|r| {
                let v = f64::from_bits(r.value().load(Ordering::Relaxed));
                Series::new(&self.desc, r.key(), SeriesValue::Gauge(v))
            })
            .collect();
        MetricFamily::new(self.desc.clone(), series)
    }
}

/// Unlabeled gauge.
pub struct Gauge {
    desc: Desc,
    bits: AtomicU64,
}

impl Gauge {
    pub fn new(desc: Desc) -> Self {
        debug_assert!(desc.label_names.is_empty());
        Self {
            desc,
            bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    pub fn set(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn collect(&self) -> MetricFamily {
        let series = vec![Series::new(&self.desc, &[], SeriesValue::Gauge(self.get()))];
        MetricFamily::new(self.desc.clone(), series)
    }
}

/// Quantile objectives and window shape of a summary.
#[derive(Debug, Clone)]
pub struct SummaryOpts {
    pub objectives: Vec<Objective>,
    /// Observations older than this no longer contribute to quantiles.
    pub max_age: Duration,
    pub age_buckets: u32,
    pub buf_cap: usize,
}

impl SummaryOpts {
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);
    pub const DEFAULT_AGE_BUCKETS: u32 = 5;
    pub const DEFAULT_BUF_CAP: usize = 500;

    pub fn new(mut objectives: Vec<Objective>) -> Self {
        objectives.sort_by(|a, b| a.quantile.total_cmp(&b.quantile));
        Self {
            objectives,
            max_age: Self::DEFAULT_MAX_AGE,
            age_buckets: Self::DEFAULT_AGE_BUCKETS,
            buf_cap: Self::DEFAULT_BUF_CAP,
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}

struct SummaryState {
    window: WindowedQuantiles,
    sum: f64,
    count: u64,
}

pub struct SummaryVec {
    desc: Desc,
    opts: SummaryOpts,
    map: DashMap<Vec<String>, Mutex<SummaryState>>,
}

impl SummaryVec {
    pub fn new(desc: Desc, opts: SummaryOpts) -> Self {
        debug_assert_eq!(desc.kind, MetricKind::Summary);
        debug_assert!(opts.objectives.iter().all(Objective::is_valid));
        Self {
            desc,
            opts,
            map: DashMap::new(),
        }
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    pub fn observe(&self, values: &[&str], v: f64) {
        self.observe_at(values, v, Instant::now());
    }

    pub(crate) fn observe_at(&self, values: &[&str], v: f64, now: Instant) {
        if !arity_ok(&self.desc, values) {
            return;
        }
        let key = key(values);
        if let Some(state) = self.map.get(&key) {
            Self::record(&state, v, now);
            return;
        }
        let state = self.map.entry(key).or_insert_with(|| {
            Mutex::new(SummaryState {
                window: WindowedQuantiles::new(
                    &self.opts.objectives,
                    self.opts.max_age,
                    self.opts.age_buckets,
                    self.opts.buf_cap,
                    now,
                ),
                sum: 0.0,
                count: 0,
            })
        });
        Self::record(&state, v, now);
    }

    fn record(state: &Mutex<SummaryState>, v: f64, now: Instant) {
        let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
        s.window.observe(v, now);
        s.sum += v;
        s.count += 1;
    }

    /// Total observations for a series since process start.
    pub fn count(&self, values: &[&str]) -> u64 {
        self.map
            .get(&key(values))
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).count)
            .unwrap_or(0)
    }

    pub fn collect(&self) -> MetricFamily {
        self.collect_at(Instant::now())
    }

    pub(crate) fn collect_at(&self, now: Instant) -> MetricFamily {
        let series = self
            .map
            .iter()
            .map(|r| {
                let mut s = r.value().lock().unwrap_or_else(PoisonError::into_inner);
                let quantiles = self
                    .opts
                    .objectives
                    .iter()
                    .map(|o| (o.quantile, s.window.query(o.quantile, now)))
                    .collect();
                let value = SeriesValue::Summary {
                    quantiles,
                    sum: s.sum,
                    count: s.count,
                };
                Series::new(&self.desc, r.key(), value)
            })
            .collect();
        MetricFamily::new(self.desc.clone(), series)
    }
}
