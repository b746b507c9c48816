//! Scrape snapshots and Prometheus text exposition.
//!
//! A [`ScrapeSnapshot`] is built once per scrape from every registered
//! collector and dropped after rendering. Nothing here is cached.

use std::fmt::Write;

use crate::collector::{Desc, MetricKind};

/// Content type of the rendered exposition.
pub const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Counter(f64),
    Gauge(f64),
    Summary {
        quantiles: Vec<(f64, f64)>,
        sum: f64,
        count: u64,
    },
}

/// One labeled series inside a family. Labels follow the family's schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Vec<(String, String)>,
    pub value: SeriesValue,
}

impl Series {
    pub fn new(desc: &Desc, values: &[String], value: SeriesValue) -> Self {
        Self {
            labels: desc
                .label_names
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
            value,
        }
    }

    fn matches(&self, labels: &[(&str, &str)]) -> bool {
        self.labels.len() == labels.len()
            && labels
                .iter()
                .all(|(k, v)| self.labels.iter().any(|(lk, lv)| lk == k && lv == v))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub desc: Desc,
    pub series: Vec<Series>,
}

impl MetricFamily {
    pub fn new(desc: Desc, mut series: Vec<Series>) -> Self {
        series.sort_by(|a, b| a.labels.cmp(&b.labels));
        Self { desc, series }
    }
}

/// Immutable rendering input for one scrape.
#[derive(Debug, Clone, Default)]
pub struct ScrapeSnapshot {
    families: Vec<MetricFamily>,
}

impl ScrapeSnapshot {
    pub fn new(mut families: Vec<MetricFamily>) -> Self {
        families.sort_by(|a, b| a.desc.name.cmp(&b.desc.name));
        Self { families }
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.desc.name == name)
    }

    /// Whether any series of `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.family(name).is_some_and(|f| !f.series.is_empty())
    }

    pub fn series(&self, name: &str, labels: &[(&str, &str)]) -> Option<&Series> {
        self.family(name)?.series.iter().find(|s| s.matches(labels))
    }

    /// Counter or gauge value of the series with exactly `labels`.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        match self.series(name, labels)?.value {
            SeriesValue::Counter(v) | SeriesValue::Gauge(v) => Some(v),
            SeriesValue::Summary { .. } => None,
        }
    }

    /// Estimated value at `q` of a summary series.
    pub fn quantile(&self, name: &str, labels: &[(&str, &str)], q: f64) -> Option<f64> {
        match &self.series(name, labels)?.value {
            SeriesValue::Summary { quantiles, .. } => quantiles
                .iter()
                .find(|(tq, _)| *tq == q)
                .map(|(_, v)| *v),
            _ => None,
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for family in &self.families {
            if family.series.is_empty() {
                continue;
            }
            let name = &family.desc.name;
            let _ = writeln!(out, "# HELP {} {}", name, escape_help(&family.desc.help));
            let _ = writeln!(out, "# TYPE {} {}", name, family.desc.kind.as_str());
            for s in &family.series {
                render_series(&mut out, name, family.desc.kind, s);
            }
        }
        out
    }
}

fn render_series(out: &mut String, name: &str, kind: MetricKind, s: &Series) {
    let label_str = s
        .labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");

    match &s.value {
        SeriesValue::Counter(v) | SeriesValue::Gauge(v) => {
            let _ = writeln!(out, "{}{} {}", name, braces(&label_str), fmt_float(*v));
        }
        SeriesValue::Summary {
            quantiles,
            sum,
            count,
        } => {
            debug_assert_eq!(kind, MetricKind::Summary);
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };
            for (q, v) in quantiles {
                let _ = writeln!(
                    out,
                    "{}{{{}quantile=\"{}\"}} {}",
                    name,
                    prefix,
                    fmt_float(*q),
                    fmt_float(*v)
                );
            }
            let _ = writeln!(out, "{}_sum{} {}", name, braces(&label_str), fmt_float(*sum));
            let _ = writeln!(out, "{}_count{} {}", name, braces(&label_str), count);
        }
    }
}

fn braces(label_str: &str) -> String {
    if label_str.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", label_str)
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}
