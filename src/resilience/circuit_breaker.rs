//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure_count >= failure_threshold
//! Open → Half-Open:   first acquire at or after next_attempt_at
//! Half-Open → Closed: success_count >= half_open_max_calls
//! Half-Open → Open:   any single failure
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (never shared between adapters)
//! - Health probes pass through the same gate as live queries
//! - Open → Half-Open happens lazily on acquire, there is no timer
//! - Transition counters let observers detect transitions they did not cause
//! - A half-open trial slot is held by a `BreakerPermit`; dropping the permit
//!   without an outcome hands the slot back

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// The breaker rejected a call without letting it reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit open, retry in {}ms", retry_in.as_millis())]
pub struct CircuitOpenError {
    pub retry_in: Duration,
}

/// A state change caused by recording an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    Closed,
}

/// Admission to one call. Report the outcome with `success` or `failure`;
/// dropping the permit unreported releases any half-open slot it holds.
#[derive(Debug)]
#[must_use = "dropping the permit discards the admission"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial_epoch: Option<u64>,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// True when this call is a half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial_epoch.is_some()
    }

    pub fn success(mut self) -> Option<Transition> {
        self.settled = true;
        self.breaker.record_success()
    }

    pub fn failure(mut self) -> Option<Transition> {
        self.settled = true;
        self.breaker.record_failure()
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(epoch) = self.trial_epoch {
            self.breaker.release_trial(epoch);
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub half_open_max_calls: u32,
    pub seconds_until_retry: u64,
    /// Number of times the circuit has entered Open.
    pub times_opened: u64,
    /// Number of times the circuit has recovered from Half-Open to Closed.
    pub times_recovered: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_attempts: u32,
    next_attempt_at: Option<Instant>,
    times_opened: u64,
    times_recovered: u64,
}

/// Per-backend failure containment state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    label: String,
    failure_threshold: u32,
    timeout: Duration,
    half_open_max_calls: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(label: impl Into<String>, config: &BreakerConfig) -> Self {
        Self {
            label: label.into(),
            failure_threshold: config.failure_threshold.max(1),
            timeout: Duration::from_millis(config.timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_attempts: 0,
                next_attempt_at: None,
                times_opened: 0,
                times_recovered: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask permission to make a call.
    ///
    /// The caller must report the outcome with `record_success` or
    /// `record_failure`. Prefer `acquire` when the call can be cancelled.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> Result<(), CircuitOpenError> {
        self.admit(now).map(|_| ())
    }

    /// Ask permission to make a call and hold the admission until an outcome
    /// is reported through the returned permit.
    pub fn acquire(&self) -> Result<BreakerPermit<'_>, CircuitOpenError> {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(&self, now: Instant) -> Result<BreakerPermit<'_>, CircuitOpenError> {
        let trial_epoch = self.admit(now)?;
        Ok(BreakerPermit {
            breaker: self,
            trial_epoch,
            settled: false,
        })
    }

    /// Returns the open count at admission when the call took a half-open slot.
    fn admit(&self, now: Instant) -> Result<Option<u64>, CircuitOpenError> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                let deadline = inner.next_attempt_at.unwrap_or(now);
                if now < deadline {
                    return Err(CircuitOpenError {
                        retry_in: deadline - now,
                    });
                }
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
                inner.half_open_attempts = 1;
                tracing::info!(backend = %self.label, "Circuit half-open, admitting trial calls");
                Ok(Some(inner.times_opened))
            }
            CircuitState::HalfOpen => {
                if inner.half_open_attempts >= self.half_open_max_calls {
                    return Err(CircuitOpenError {
                        retry_in: Duration::ZERO,
                    });
                }
                inner.half_open_attempts += 1;
                Ok(Some(inner.times_opened))
            }
        }
    }

    /// Give back a half-open slot whose call ended without an outcome.
    fn release_trial(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.state != CircuitState::HalfOpen || inner.times_opened != epoch {
            return;
        }
        inner.half_open_attempts = inner.half_open_attempts.saturating_sub(1);
        tracing::debug!(
            backend = %self.label,
            attempts = inner.half_open_attempts,
            "Abandoned trial call released its slot"
        );
    }

    /// Record a successful call.
    pub fn record_success(&self) -> Option<Transition> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                None
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count < self.half_open_max_calls {
                    return None;
                }
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.success_count = 0;
                inner.half_open_attempts = 0;
                inner.next_attempt_at = None;
                inner.times_recovered += 1;
                tracing::info!(backend = %self.label, "Circuit closed, backend recovered");
                Some(Transition::Closed)
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => None,
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) -> Option<Transition> {
        self.record_failure_at(Instant::now())
    }

    pub fn record_failure_at(&self, now: Instant) -> Option<Transition> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count < self.failure_threshold {
                    return None;
                }
                self.open(&mut inner, now);
                tracing::warn!(
                    backend = %self.label,
                    failures = inner.failure_count,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Circuit opened"
                );
                Some(Transition::Opened)
            }
            CircuitState::HalfOpen => {
                self.open(&mut inner, now);
                tracing::warn!(backend = %self.label, "Trial call failed, circuit reopened");
                Some(Transition::Opened)
            }
            CircuitState::Open => None,
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.next_attempt_at = Some(now + self.timeout);
        inner.success_count = 0;
        inner.half_open_attempts = 0;
        inner.times_opened += 1;
    }

    /// True while the circuit is open and its retry deadline has not passed.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        let inner = self.lock();
        inner.state == CircuitState::Open && inner.next_attempt_at.is_some_and(|at| now < at)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.lock();
        let seconds_until_retry = match (inner.state, inner.next_attempt_at) {
            (CircuitState::Open, Some(at)) if at > now => {
                let remaining = at - now;
                remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
            }
            _ => 0,
        };
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            failure_threshold: self.failure_threshold,
            half_open_max_calls: self.half_open_max_calls,
            seconds_until_retry,
            times_opened: inner.times_opened,
            times_recovered: inner.times_recovered,
        }
    }
}
