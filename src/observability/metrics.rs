//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_attempts_total` (counter): attempts by outcome
//! - `balancer_exhausted_total` (counter): requests that ran out of endpoints
//! - `balancer_endpoint_health_level` (gauge): level per endpoint, 0 = green
//! - `balancer_overall_health_level` (gauge): best level across endpoints
//! - `balancer_resolved_endpoints` (gauge): addresses from the last resolution
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Outcome label of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Retryable,
    Fatal,
    ProbeFailed,
    DeadlineExceeded,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retryable => "retryable",
            Self::Fatal => "fatal",
            Self::ProbeFailed => "probe_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_attempt(outcome: AttemptOutcome) {
    counter!("balancer_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_exhausted() {
    counter!("balancer_exhausted_total").increment(1);
}

pub fn record_endpoint_level(endpoint: &str, level: u32) {
    gauge!("balancer_endpoint_health_level", "endpoint" => endpoint.to_string()).set(level as f64);
}

pub fn record_overall_health(level: u32) {
    gauge!("balancer_overall_health_level").set(level as f64);
}

pub fn record_resolution(addresses: usize) {
    gauge!("balancer_resolved_endpoints").set(addresses as f64);
}
