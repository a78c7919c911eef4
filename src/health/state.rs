//! Per-adapter health state and quality scoring.
//!
//! # Quality score
//! ```text
//! time_score    = 100 - response_time_ms / latency_ms_per_point
//! error_penalty = min(max_error_penalty, error_count * error_penalty)
//! quality_score = clamp(time_score - error_penalty, 0, 100)
//! ```
//!
//! # Design Decisions
//! - The score is derived on every snapshot and never stored
//! - One mutex per adapter; no lock spans more than one adapter
//! - error_count grows on any failure and decays by one per successful probe

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::backends::{ConnectionKind, HealthStatus};
use crate::config::QualityConfig;

/// Compute a quality score from latency and error count.
pub fn quality_score(profile: &QualityConfig, response_time_ms: u64, error_count: u32) -> f64 {
    let per_point = profile.latency_ms_per_point.max(f64::EPSILON);
    let time_score = 100.0 - response_time_ms as f64 / per_point;
    let penalty = (f64::from(error_count) * profile.error_penalty).min(profile.max_error_penalty);
    (time_score - penalty).clamp(0.0, 100.0)
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug)]
struct Inner {
    available: bool,
    response_time_ms: u64,
    last_health_check: Option<u64>,
    error_count: u32,
    connection_kind: ConnectionKind,
}

/// Mutable health record owned by one adapter.
#[derive(Debug)]
pub struct HealthState {
    profile: QualityConfig,
    inner: Mutex<Inner>,
}

impl HealthState {
    pub fn new(connection_kind: ConnectionKind, available: bool, profile: QualityConfig) -> Self {
        Self {
            profile,
            inner: Mutex::new(Inner {
                available,
                response_time_ms: 0,
                last_health_check: None,
                error_count: 0,
                connection_kind,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A live query succeeded.
    pub fn record_query_success(&self, latency: Duration) {
        let mut inner = self.lock();
        inner.available = true;
        inner.response_time_ms = latency.as_millis() as u64;
    }

    /// A live query failed.
    pub fn record_query_failure(&self) {
        let mut inner = self.lock();
        inner.error_count = inner.error_count.saturating_add(1);
    }

    /// A live query failed and the adapter has no breaker to fall back on.
    pub fn record_query_failure_unavailable(&self) {
        let mut inner = self.lock();
        inner.error_count = inner.error_count.saturating_add(1);
        inner.available = false;
    }

    /// Record the outcome of a health probe.
    pub fn record_probe(&self, healthy: bool, latency: Duration) {
        let mut inner = self.lock();
        inner.available = healthy;
        inner.last_health_check = Some(now_millis());
        if healthy {
            inner.response_time_ms = latency.as_millis() as u64;
            inner.error_count = inner.error_count.saturating_sub(1);
        } else {
            inner.error_count = inner.error_count.saturating_add(1);
        }
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    pub fn snapshot(&self) -> HealthStatus {
        let inner = self.lock();
        HealthStatus {
            available: inner.available,
            response_time_ms: inner.response_time_ms,
            last_health_check: inner.last_health_check,
            error_count: inner.error_count,
            quality_score: quality_score(&self.profile, inner.response_time_ms, inner.error_count),
            connection_kind: inner.connection_kind,
        }
    }
}
