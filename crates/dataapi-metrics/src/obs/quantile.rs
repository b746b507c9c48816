//! Targeted quantile estimation for summaries.
//!
//! [`QuantileStream`] keeps a compressed, rank-annotated sample list in the
//! style of Cormode/Korn/Muthukrishnan/Srivastava: each objective `(q, e)`
//! bounds the rank error at quantile `q` to `e * n`. Observations are buffered
//! and merged in sorted blocks; until the first merge, queries are exact.
//!
//! [`WindowedQuantiles`] layers a sliding window on top by keeping several
//! staggered streams and rotating the oldest one out every
//! `max_age / age_buckets`.

use std::time::{Duration, Instant};

/// One quantile target and its tolerated rank error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub quantile: f64,
    pub error: f64,
}

impl Objective {
    pub const fn new(quantile: f64, error: f64) -> Self {
        Self { quantile, error }
    }

    pub fn is_valid(&self) -> bool {
        self.quantile > 0.0
            && self.quantile < 1.0
            && self.error > 0.0
            && self.error < self.quantile.min(1.0 - self.quantile)
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    width: f64,
    delta: f64,
}

#[derive(Debug, Clone)]
pub struct QuantileStream {
    objectives: Vec<Objective>,
    buf: Vec<f64>,
    buf_cap: usize,
    samples: Vec<Sample>,
    n: f64,
}

impl QuantileStream {
    pub fn new(objectives: &[Objective], buf_cap: usize) -> Self {
        let buf_cap = buf_cap.max(1);
        Self {
            objectives: objectives.to_vec(),
            buf: Vec::with_capacity(buf_cap),
            buf_cap,
            samples: Vec::new(),
            n: 0.0,
        }
    }

    pub fn insert(&mut self, v: f64) {
        self.buf.push(v);
        if self.buf.len() >= self.buf_cap {
            self.flush();
        }
    }

    /// Estimated value at quantile `q`, or NaN when empty.
    pub fn query(&mut self, q: f64) -> f64 {
        if self.samples.is_empty() {
            if self.buf.is_empty() {
                return f64::NAN;
            }
            self.buf.sort_by(|a, b| a.total_cmp(b));
            let len = self.buf.len();
            let idx = ((len as f64 * q).ceil() as usize).saturating_sub(1).min(len - 1);
            return self.buf[idx];
        }
        self.flush();
        self.query_merged(q)
    }

    #[cfg(test)]
    fn count(&self) -> u64 {
        self.n as u64 + self.buf.len() as u64
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.samples.clear();
        self.n = 0.0;
    }

    /// Maximum allowed width+delta at rank `r` across all objectives.
    fn invariant(&self, r: f64) -> f64 {
        let n = self.n;
        self.objectives
            .iter()
            .map(|o| {
                if o.quantile * n <= r {
                    2.0 * o.error * r / o.quantile
                } else {
                    2.0 * o.error * (n - r) / (1.0 - o.quantile)
                }
            })
            .fold(f64::MAX, f64::min)
    }

    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let mut incoming = std::mem::take(&mut self.buf);
        incoming.sort_by(|a, b| a.total_cmp(b));
        self.merge(&incoming);
        incoming.clear();
        self.buf = incoming;
        self.compress();
    }

    fn merge(&mut self, sorted: &[f64]) {
        let existing = std::mem::take(&mut self.samples);
        let mut merged = Vec::with_capacity(existing.len() + sorted.len());
        let mut rest = existing.into_iter().peekable();
        let mut r = 0.0;

        for &v in sorted {
            while let Some(c) = rest.next_if(|c| c.value <= v) {
                r += c.width;
                merged.push(c);
            }
            // Appending past the last sample carries no rank uncertainty.
            let delta = if rest.peek().is_some() {
                (self.invariant(r).floor() - 1.0).max(0.0)
            } else {
                0.0
            };
            merged.push(Sample {
                value: v,
                width: 1.0,
                delta,
            });
            self.n += 1.0;
            r += 1.0;
        }
        merged.extend(rest);
        self.samples = merged;
    }

    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }
        let samples = std::mem::take(&mut self.samples);
        let mut kept = Vec::with_capacity(samples.len());

        let last = samples.len() - 1;
        let mut x = samples[last];
        let mut r = self.n - 1.0 - x.width;

        for c in samples[..last].iter().rev() {
            if c.width + x.width + x.delta <= self.invariant(r) {
                x.width += c.width;
            } else {
                kept.push(x);
                x = *c;
            }
            r -= c.width;
        }
        kept.push(x);
        kept.reverse();
        self.samples = kept;
    }

    fn query_merged(&self, q: f64) -> f64 {
        let mut t = (q * self.n).ceil();
        t += (self.invariant(t) / 2.0).ceil();

        let mut prev = self.samples[0];
        let mut r = 0.0;
        for c in &self.samples[1..] {
            r += prev.width;
            if r + c.width + c.delta > t {
                return prev.value;
            }
            prev = *c;
        }
        prev.value
    }
}

/// Sliding-window quantiles built from staggered [`QuantileStream`]s.
#[derive(Debug, Clone)]
pub struct WindowedQuantiles {
    streams: Vec<QuantileStream>,
    head: usize,
    head_expires: Instant,
    stream_duration: Duration,
    max_age: Duration,
}

impl WindowedQuantiles {
    pub fn new(
        objectives: &[Objective],
        max_age: Duration,
        age_buckets: u32,
        buf_cap: usize,
        now: Instant,
    ) -> Self {
        let buckets = age_buckets.max(1);
        let stream_duration = max_age / buckets;
        Self {
            streams: (0..buckets)
                .map(|_| QuantileStream::new(objectives, buf_cap))
                .collect(),
            head: 0,
            head_expires: now + stream_duration,
            stream_duration,
            max_age,
        }
    }

    pub fn observe(&mut self, v: f64, now: Instant) {
        self.rotate(now);
        for s in &mut self.streams {
            s.insert(v);
        }
    }

    pub fn query(&mut self, q: f64, now: Instant) -> f64 {
        self.rotate(now);
        self.streams[self.head].query(q)
    }

    fn rotate(&mut self, now: Instant) {
        if now < self.head_expires {
            return;
        }
        if now.duration_since(self.head_expires) >= self.max_age || self.stream_duration.is_zero() {
            for s in &mut self.streams {
                s.reset();
            }
            self.head = 0;
            self.head_expires = now + self.stream_duration;
            return;
        }
        while now >= self.head_expires {
            self.streams[self.head].reset();
            self.head = (self.head + 1) % self.streams.len();
            self.head_expires += self.stream_duration;
        }
    }
}
