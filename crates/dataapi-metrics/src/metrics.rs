//! Data API metric store.
//!
//! Owns every counter, gauge and summary the data API records and offers the
//! domain operations call sites use (request outcomes, latency, ejection
//! activity). Recording never fails and never returns an error to the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use dataapi_core::Code;

use crate::collector::{Collector, Desc, MetricKind};
use crate::obs::{CounterVec, Gauge, GaugeVec, Objective, SummaryOpts, SummaryVec};
use crate::snapshot::MetricFamily;

pub const NAMESPACE: &str = "eigenda_dataapi";

/// Latency quantile targets; tail quantiles get tighter tolerances.
pub const LATENCY_OBJECTIVES: [Objective; 4] = [
    Objective::new(0.5, 0.05),
    Objective::new(0.9, 0.01),
    Objective::new(0.95, 0.01),
    Objective::new(0.99, 0.001),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Failed,
    NotFound,
}

impl RequestOutcome {
    /// Value of the `status` label.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Failed => "failed",
            RequestOutcome::NotFound => "not found",
        }
    }
}

/// What triggered an ejection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectionMode {
    /// Initiated on the SLA evaluation schedule.
    Periodic,
    /// Initiated because of bad network health.
    Urgent,
}

impl EjectionMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "periodic" => Some(EjectionMode::Periodic),
            "urgent" => Some(EjectionMode::Urgent),
            _ => None,
        }
    }
}

pub struct Metrics {
    num_requests: CounterVec,
    latency: SummaryVec,
    periodic_ejection_requests: CounterVec,
    urgent_ejection_requests: CounterVec,
    // Requested, not actually ejected: the ejection contract may rate limit.
    operators_to_eject: CounterVec,
    stake_share_to_eject: GaugeVec,
    ejection_gas_used: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            num_requests: CounterVec::new(Desc::new(
                NAMESPACE,
                "requests",
                "the number of requests",
                MetricKind::Counter,
                &["status", "method"],
            )),
            latency: SummaryVec::new(
                Desc::new(
                    NAMESPACE,
                    "latency_ms",
                    "latency summary in milliseconds",
                    MetricKind::Summary,
                    &["method"],
                ),
                SummaryOpts::new(LATENCY_OBJECTIVES.to_vec()),
            ),
            periodic_ejection_requests: CounterVec::new(Desc::new(
                NAMESPACE,
                "periodic_ejection_requests_total",
                "the total number of periodic ejection requests",
                MetricKind::Counter,
                &["status"],
            )),
            urgent_ejection_requests: CounterVec::new(Desc::new(
                NAMESPACE,
                "urgent_ejection_requests_total",
                "the total number of urgent ejection requests",
                MetricKind::Counter,
                &["status"],
            )),
            operators_to_eject: CounterVec::new(Desc::new(
                NAMESPACE,
                "operators_to_eject",
                "the total number of operators requested to eject",
                MetricKind::Counter,
                &["quorum"],
            )),
            stake_share_to_eject: GaugeVec::new(Desc::new(
                NAMESPACE,
                "stake_share_to_eject",
                "the total stake share requested to eject",
                MetricKind::Gauge,
                &["quorum"],
            )),
            ejection_gas_used: Gauge::new(Desc::new(
                NAMESPACE,
                "ejection_gas_used",
                "Gas used for operator ejection",
                MetricKind::Gauge,
                &[],
            )),
        }
    }

    /// Record the latency of one call to `method`.
    pub fn observe_latency(&self, method: &str, latency_ms: f64) {
        self.latency.observe(&[method], latency_ms);
    }

    pub fn record_request(&self, method: &str, outcome: RequestOutcome) {
        self.num_requests.inc(&[outcome.as_str(), method]);
    }

    pub fn increment_successful_request_num(&self, method: &str) {
        self.record_request(method, RequestOutcome::Success);
    }

    pub fn increment_failed_request_num(&self, method: &str) {
        self.record_request(method, RequestOutcome::Failed);
    }

    pub fn increment_not_found_request_num(&self, method: &str) {
        self.record_request(method, RequestOutcome::NotFound);
    }

    /// Count one ejection call. Modes other than `periodic` and `urgent` are
    /// dropped without touching any series.
    pub fn increment_ejection_request(&self, mode: &str, status: Code) {
        let Some(mode) = EjectionMode::parse(mode) else {
            tracing::warn!(%mode, %status, "unrecognized ejection mode, not recorded");
            return;
        };
        let status = status.to_string();
        match mode {
            EjectionMode::Periodic => self.periodic_ejection_requests.inc(&[&status]),
            EjectionMode::Urgent => self.urgent_ejection_requests.inc(&[&status]),
        }
    }

    /// Record the size of the latest ejection request.
    ///
    /// Operator counts accumulate per quorum; stake share is the share of the
    /// most recent request and replaces the previous value.
    pub fn update_requested_operator_metric(
        &self,
        num_operators_by_quorum: &HashMap<u8, usize>,
        stake_share_by_quorum: &HashMap<u8, f64>,
    ) {
        for (quorum, count) in num_operators_by_quorum {
            if *count == 0 {
                continue;
            }
            self.operators_to_eject
                .add(&[&quorum.to_string()], *count as u64);
        }
        for (quorum, share) in stake_share_by_quorum {
            self.stake_share_to_eject.set(&[&quorum.to_string()], *share);
        }
    }

    /// Gas cost of the most recent ejection transaction.
    pub fn update_ejection_gas_used(&self, gas_used: u64) {
        self.ejection_gas_used.set(gas_used as f64);
    }
}

#[async_trait]
impl Collector for Metrics {
    fn describe(&self) -> Vec<Desc> {
        vec![
            self.num_requests.desc().clone(),
            self.latency.desc().clone(),
            self.periodic_ejection_requests.desc().clone(),
            self.urgent_ejection_requests.desc().clone(),
            self.operators_to_eject.desc().clone(),
            self.stake_share_to_eject.desc().clone(),
            self.ejection_gas_used.desc().clone(),
        ]
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        vec![
            self.num_requests.collect(),
            self.latency.collect(),
            self.periodic_ejection_requests.collect(),
            self.urgent_ejection_requests.collect(),
            self.operators_to_eject.collect(),
            self.stake_share_to_eject.collect(),
            self.ejection_gas_used.collect(),
        ]
    }
}
