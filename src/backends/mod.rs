//! Backend adapter subsystem.
//!
//! # Data Flow
//! ```text
//! FallbackOrchestrator
//!     → BackendAdapter::query(request)
//!         → circuit breaker gate (adapters that own one)
//!         → transport:
//!             - http.rs (request-response: primary, cloud_function, specialist)
//!             - local_bridge.rs (persistent WebSocket with pending-request table)
//!         → outcome recorded into health::state and the breaker
//!
//! HealthMonitor
//!     → BackendAdapter::probe() (lightweight connectivity check)
//! ```
//!
//! # Design Decisions
//! - One uniform async trait; the orchestrator never sees transport details
//! - Each adapter owns its breaker and health record, nothing is shared
//! - A disabled backend is an explicit adapter type, not a null object

use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;

use crate::health::state::HealthState;
use crate::observability::metrics;
use crate::orchestrator::types::{AiRequest, AiResponse};
use crate::resilience::CircuitBreaker;

pub mod cloud_function;
pub mod disabled;
pub mod http;
pub mod local_bridge;
pub mod primary;
pub mod prompt;
pub mod specialist;
pub mod types;

pub use cloud_function::CloudFunctionAdapter;
pub use disabled::DisabledAdapter;
pub use local_bridge::LocalBridgeAdapter;
pub use primary::PrimaryAdapter;
pub use specialist::SpecialistAdapter;
pub use types::{BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};

/// Uniform contract every backend integration implements.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Identity, fixed at construction.
    fn id(&self) -> BackendId;

    /// Answer a request, or fail with a transport-specific error.
    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse>;

    /// Last-known health snapshot. Never blocks on I/O.
    fn status(&self) -> HealthStatus;

    /// Lightweight connectivity check, used only by the health monitor.
    async fn probe(&self) -> bool;

    /// The adapter's breaker, if it opted into one.
    fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        None
    }

    /// Release long-lived connections.
    async fn close(&self) {}
}

/// Run a live query through an adapter's breaker and health record.
///
/// `call` is not polled when the breaker rejects the attempt. If the returned
/// future is dropped mid-call, the breaker admission is released unreported.
pub(crate) async fn guarded_query<F>(
    backend: BackendId,
    breaker: Option<&CircuitBreaker>,
    health: &HealthState,
    call: F,
) -> BackendResult<AiResponse>
where
    F: Future<Output = BackendResult<AiResponse>>,
{
    let permit = match breaker {
        Some(cb) => Some(cb.acquire().map_err(|e| BackendError::CircuitOpen {
            backend,
            retry_in: e.retry_in,
        })?),
        None => None,
    };

    let started = Instant::now();
    let result = call.await;
    let elapsed = started.elapsed();

    match (&result, permit) {
        (Ok(_), Some(permit)) => {
            health.record_query_success(elapsed);
            permit.success();
        }
        (Ok(_), None) => health.record_query_success(elapsed),
        (Err(_), Some(permit)) => {
            health.record_query_failure();
            permit.failure();
        }
        (Err(_), None) => health.record_query_failure_unavailable(),
    }

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::record_query(backend.as_str(), outcome, elapsed);
    result
}
