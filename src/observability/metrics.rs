//! Metrics collection and exposition.
//!
//! # Metrics
//! - `orchestrator_queries_total` (counter): adapter calls by backend, outcome
//! - `orchestrator_query_duration_seconds` (histogram): adapter call latency
//! - `orchestrator_offline_responses_total` (counter): synthetic replies by kind
//! - `orchestrator_backend_available` (gauge): 1=available, 0=unavailable
//! - `orchestrator_backend_quality` (gauge): 0..100 quality score
//! - `orchestrator_circuit_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `orchestrator_health_interval_seconds` (gauge): current probe period

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_query(backend: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("orchestrator_queries_total", "backend" => backend, "outcome" => outcome).increment(1);
    histogram!("orchestrator_query_duration_seconds", "backend" => backend).record(elapsed.as_secs_f64());
}

pub fn record_offline_response(kind: &'static str) {
    counter!("orchestrator_offline_responses_total", "kind" => kind).increment(1);
}

pub fn record_backend_health(backend: &'static str, available: bool, quality: f64) {
    gauge!("orchestrator_backend_available", "backend" => backend).set(if available { 1.0 } else { 0.0 });
    gauge!("orchestrator_backend_quality", "backend" => backend).set(quality);
}

pub fn record_circuit_state(backend: &'static str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("orchestrator_circuit_state", "backend" => backend).set(value);
}

pub fn record_health_interval(backend: &'static str, interval: Duration) {
    gauge!("orchestrator_health_interval_seconds", "backend" => backend).set(interval.as_secs_f64());
}
