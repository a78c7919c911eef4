//! Fallback orchestrator.
//!
//! # Responsibilities
//! - Dispatch each request down the configured chain, first success wins
//! - Turn total exhaustion into an offline response, never an error
//! - Report the advisory "best backend" for status displays
//!
//! # Design Decisions
//! - Dispatch and advisory selection are deliberately separate walks: the
//!   advisory one is quality-gated, dispatch only skips open or unavailable
//!   backends
//! - The chain is swapped atomically on config reload; in-flight requests
//!   finish on the chain they started with

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::backends::{BackendAdapter, BackendError, BackendId};
use crate::config::FallbackConfig;
use crate::orchestrator::offline::offline_response;
use crate::orchestrator::types::{AiRequest, AiResponse};

/// Internal dispatch failure. Never returned from [`FallbackOrchestrator::query`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("all backends exhausted ({} attempted, {} skipped)", attempted.len(), skipped.len())]
    AllBackendsExhausted {
        attempted: Vec<(BackendId, BackendError)>,
        skipped: Vec<BackendId>,
    },
}

pub struct FallbackOrchestrator {
    adapters: HashMap<BackendId, Arc<dyn BackendAdapter>>,
    fallback: ArcSwap<FallbackConfig>,
}

impl FallbackOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>, fallback: FallbackConfig) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self {
            adapters,
            fallback: ArcSwap::from_pointee(fallback),
        }
    }

    pub fn chain(&self) -> Vec<BackendId> {
        self.fallback.load().chain.clone()
    }

    pub fn fallback_config(&self) -> Arc<FallbackConfig> {
        self.fallback.load_full()
    }

    /// Replace the chain order and quality thresholds.
    pub fn update_fallback(&self, fallback: FallbackConfig) {
        tracing::info!(chain = ?fallback.chain, "Fallback chain updated");
        self.fallback.store(Arc::new(fallback));
    }

    /// Answer a request. Always produces exactly one response.
    pub async fn query(&self, request: &AiRequest) -> AiResponse {
        let started = Instant::now();
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    kind = %request.kind,
                    error = %e,
                    "Serving offline response"
                );
                offline_response(request, started.elapsed())
            }
        }
    }

    /// Walk the chain in order; first success wins.
    pub async fn dispatch(&self, request: &AiRequest) -> Result<AiResponse, DispatchError> {
        let fallback = self.fallback.load_full();
        let mut attempted = Vec::new();
        let mut skipped = Vec::new();

        for &id in &fallback.chain {
            let Some(adapter) = self.adapters.get(&id) else {
                skipped.push(id);
                continue;
            };
            if adapter.circuit_breaker().is_some_and(|cb| cb.is_open()) {
                tracing::debug!(request_id = %request.request_id, backend = %id, "Skipping backend, circuit open");
                skipped.push(id);
                continue;
            }
            if !adapter.status().available {
                tracing::debug!(request_id = %request.request_id, backend = %id, "Skipping unavailable backend");
                skipped.push(id);
                continue;
            }

            match adapter.query(request).await {
                Ok(response) => {
                    tracing::info!(
                        request_id = %request.request_id,
                        backend = %id,
                        latency_ms = response.latency_ms,
                        "Request answered"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if e.is_fast_fail() {
                        tracing::debug!(request_id = %request.request_id, backend = %id, error = %e, "Backend short-circuited");
                    } else {
                        tracing::warn!(request_id = %request.request_id, backend = %id, error = %e, "Backend failed, falling back");
                    }
                    attempted.push((id, e));
                }
            }
        }

        Err(DispatchError::AllBackendsExhausted { attempted, skipped })
    }

    /// First backend in chain order whose breaker is not open and whose
    /// quality meets its threshold. Advisory only.
    pub fn best_backend(&self) -> BackendId {
        let fallback = self.fallback.load();
        fallback
            .chain
            .iter()
            .copied()
            .find(|id| {
                self.adapters.get(id).is_some_and(|adapter| {
                    let open = adapter.circuit_breaker().is_some_and(|cb| cb.is_open());
                    !open && adapter.status().quality_score >= fallback.threshold_for(*id)
                })
            })
            .unwrap_or(BackendId::Offline)
    }
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("chain", &self.fallback.load().chain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendResult, ConnectionKind, DisabledAdapter, HealthStatus};
    use crate::config::BreakerConfig;
    use crate::orchestrator::types::RequestKind;
    use crate::resilience::CircuitBreaker;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        id: BackendId,
        ok: bool,
        quality: f64,
        calls: AtomicU32,
        breaker: CircuitBreaker,
    }

    impl Fixed {
        fn new(id: BackendId, ok: bool, quality: f64) -> Arc<Self> {
            Arc::new(Self {
                id,
                ok,
                quality,
                calls: AtomicU32::new(0),
                breaker: CircuitBreaker::new(id.as_str(), &BreakerConfig::default()),
            })
        }
    }

    #[async_trait]
    impl BackendAdapter for Fixed {
        fn id(&self) -> BackendId {
            self.id
        }

        async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.ok {
                return Err(BackendError::transport(self.id, "boom"));
            }
            Ok(AiResponse {
                request_id: request.request_id.clone(),
                backend_used: self.id,
                text: format!("from {}", self.id),
                confidence: 80,
                latency_ms: 1,
                analysis_payload: None,
                timestamp: 0,
            })
        }

        fn status(&self) -> HealthStatus {
            HealthStatus {
                available: true,
                response_time_ms: 0,
                last_health_check: None,
                error_count: 0,
                quality_score: self.quality,
                connection_kind: ConnectionKind::RequestResponse,
            }
        }

        async fn probe(&self) -> bool {
            self.ok
        }

        fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
            Some(&self.breaker)
        }
    }

    fn request() -> AiRequest {
        AiRequest::new("req-7", RequestKind::PlayerComparison, "A or B?")
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let failing = Fixed::new(BackendId::Primary, false, 90.0);
        let working = Fixed::new(BackendId::CloudFunction, true, 90.0);
        let never = Fixed::new(BackendId::Specialist, true, 90.0);
        let orchestrator = FallbackOrchestrator::new(
            vec![failing.clone(), working.clone(), never.clone()],
            FallbackConfig {
                chain: vec![BackendId::Primary, BackendId::CloudFunction, BackendId::Specialist],
                ..FallbackConfig::default()
            },
        );

        let response = orchestrator.query(&request()).await;
        assert_eq!(response.backend_used, BackendId::CloudFunction);
        assert_eq!(response.request_id, "req-7");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_offline() {
        let failing = Fixed::new(BackendId::Primary, false, 90.0);
        let orchestrator = FallbackOrchestrator::new(
            vec![
                failing.clone() as Arc<dyn BackendAdapter>,
                Arc::new(DisabledAdapter::new(BackendId::LocalBridge)),
            ],
            FallbackConfig::default(),
        );

        let err = orchestrator.dispatch(&request()).await.unwrap_err();
        let DispatchError::AllBackendsExhausted { attempted, skipped } = err;
        assert_eq!(attempted.len(), 1);
        assert_eq!(skipped, vec![BackendId::LocalBridge, BackendId::CloudFunction, BackendId::Specialist]);

        let response = orchestrator.query(&request()).await;
        assert!(response.is_offline());
        assert_eq!(response.request_id, "req-7");
    }

    #[tokio::test]
    async fn test_open_breaker_is_skipped() {
        let open = Fixed::new(BackendId::Primary, true, 90.0);
        for _ in 0..5 {
            open.breaker.record_failure();
        }
        let orchestrator = FallbackOrchestrator::new(vec![open.clone()], FallbackConfig::default());

        assert!(orchestrator.query(&request()).await.is_offline());
        assert_eq!(open.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_best_backend_is_quality_gated() {
        let weak = Fixed::new(BackendId::Primary, true, 65.0);
        let strong = Fixed::new(BackendId::LocalBridge, true, 61.0);
        let orchestrator = FallbackOrchestrator::new(vec![weak, strong], FallbackConfig::default());
        // Primary needs 70, local bridge needs 60.
        assert_eq!(orchestrator.best_backend(), BackendId::LocalBridge);

        orchestrator.update_fallback(FallbackConfig {
            chain: vec![BackendId::Primary],
            ..FallbackConfig::default()
        });
        assert_eq!(orchestrator.best_backend(), BackendId::Offline);
        assert_eq!(orchestrator.chain(), vec![BackendId::Primary]);
    }
}
