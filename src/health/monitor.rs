//! Per-adapter health monitor.
//!
//! # Responsibilities
//! - Probe one adapter on a recurring timer
//! - Feed probe outcomes into the adapter's circuit breaker
//! - Widen the probe interval when the circuit opens, reset it on recovery
//! - Keep probe-failure logging sparse during long outages
//!
//! # Design Decisions
//! - Transitions are detected from the breaker's counters, so transitions
//!   caused by live queries between ticks are honored too
//! - While the breaker rejects the probe, no network call is made
//! - The interval only changes on a transition, never in a steady state

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::backends::{BackendAdapter, BackendId};
use crate::config::HealthCheckConfig;
use crate::health::backoff::HealthCheckBackoff;
use crate::lifecycle::schedule::{RecurringTask, Reschedule};
use crate::observability::metrics;
use crate::resilience::{BreakerSnapshot, CircuitState};

/// Outcome of one monitor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy,
    /// The breaker was open and the probe was not sent.
    Skipped,
}

pub struct HealthMonitor {
    adapter: Arc<dyn BackendAdapter>,
    backoff: HealthCheckBackoff,
    log_sample_every: u32,
    consecutive_failures: u32,
    seen_opened: u64,
    seen_recovered: u64,
}

impl HealthMonitor {
    pub fn new(adapter: Arc<dyn BackendAdapter>, config: &HealthCheckConfig) -> Self {
        let (seen_opened, seen_recovered) = adapter
            .circuit_breaker()
            .map(|cb| {
                let snapshot = cb.snapshot();
                (snapshot.times_opened, snapshot.times_recovered)
            })
            .unwrap_or_default();

        Self {
            adapter,
            backoff: HealthCheckBackoff::new(config),
            log_sample_every: config.log_sample_every.max(1),
            consecutive_failures: 0,
            seen_opened,
            seen_recovered,
        }
    }

    pub fn backend(&self) -> BackendId {
        self.adapter.id()
    }

    /// Current probe interval.
    pub fn interval(&self) -> Duration {
        self.backoff.current()
    }

    /// Run one probe cycle and report whether the timer must restart.
    pub async fn tick(&mut self) -> Reschedule {
        let outcome = self.probe().await;
        self.log_outcome(outcome);

        let reschedule = match self.adapter.circuit_breaker().map(|cb| cb.snapshot()) {
            Some(snapshot) => self.apply_transitions(&snapshot),
            None => Reschedule::Keep,
        };
        self.export_metrics();
        reschedule
    }

    async fn probe(&self) -> ProbeOutcome {
        let healthy = match self.adapter.circuit_breaker() {
            Some(cb) => {
                let Ok(permit) = cb.acquire() else {
                    return ProbeOutcome::Skipped;
                };
                let healthy = self.adapter.probe().await;
                if healthy {
                    permit.success();
                } else {
                    permit.failure();
                }
                healthy
            }
            None => self.adapter.probe().await,
        };

        if healthy {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Unhealthy
        }
    }

    fn log_outcome(&mut self, outcome: ProbeOutcome) {
        let backend = self.adapter.id();
        match outcome {
            ProbeOutcome::Healthy => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        backend = %backend,
                        failures = self.consecutive_failures,
                        "Backend probe succeeded after failures"
                    );
                }
                self.consecutive_failures = 0;
            }
            ProbeOutcome::Unhealthy => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let n = self.consecutive_failures;
                if n == 1 || n % self.log_sample_every == 0 {
                    tracing::warn!(backend = %backend, consecutive_failures = n, "Backend probe failed");
                } else {
                    tracing::debug!(backend = %backend, consecutive_failures = n, "Backend probe failed");
                }
            }
            ProbeOutcome::Skipped => {
                tracing::trace!(backend = %backend, "Probe skipped, circuit open");
            }
        }
    }

    fn apply_transitions(&mut self, snapshot: &BreakerSnapshot) -> Reschedule {
        let opened = snapshot.times_opened > self.seen_opened;
        let recovered = snapshot.times_recovered > self.seen_recovered;
        self.seen_opened = snapshot.times_opened;
        self.seen_recovered = snapshot.times_recovered;

        if !opened && !recovered {
            return Reschedule::Keep;
        }

        let backend = self.adapter.id();
        let before = self.backoff.current();
        match (opened, recovered) {
            (true, false) => {
                self.backoff.on_open();
            }
            (false, true) => {
                self.backoff.on_recovery();
            }
            _ => {
                // Both happened since the last tick; the current state decides which came last.
                self.backoff.on_recovery();
                if snapshot.state != CircuitState::Closed {
                    self.backoff.on_open();
                }
            }
        }

        let after = self.backoff.current();
        if snapshot.state == CircuitState::Closed {
            tracing::info!(backend = %backend, interval_ms = after.as_millis() as u64, "Circuit closed, probe interval reset");
        } else {
            tracing::warn!(
                backend = %backend,
                interval_ms = after.as_millis() as u64,
                retry_in_secs = snapshot.seconds_until_retry,
                "Circuit opened, probe interval widened"
            );
        }

        if after == before {
            tracing::debug!(backend = %backend, "Probe interval already at its bound, restarting timer");
        }
        Reschedule::Restart(after)
    }

    fn export_metrics(&self) {
        let backend = self.adapter.id().as_str();
        let status = self.adapter.status();
        metrics::record_backend_health(backend, status.available, status.quality_score);
        metrics::record_health_interval(backend, self.backoff.current());
        if let Some(cb) = self.adapter.circuit_breaker() {
            metrics::record_circuit_state(backend, cb.state());
        }
    }

    /// Run this monitor on a recurring task until shutdown.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> RecurringTask {
        let name = format!("health-{}", self.adapter.id());
        let period = self.interval();
        let monitor = Arc::new(Mutex::new(self));
        RecurringTask::spawn(name, period, shutdown, move || {
            let monitor = monitor.clone();
            async move { monitor.lock().await.tick().await }
        })
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("backend", &self.adapter.id())
            .field("interval", &self.backoff.current())
            .field("consecutive_failures", &self.consecutive_failures)
            .finish()
    }
}
