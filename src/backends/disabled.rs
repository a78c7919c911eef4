//! Adapter standing in for a backend turned off by configuration.

use async_trait::async_trait;

use crate::backends::{BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};
use crate::orchestrator::types::{AiRequest, AiResponse};

/// Always unavailable, always fails, never touches the network.
#[derive(Debug, Clone, Copy)]
pub struct DisabledAdapter {
    id: BackendId,
}

impl DisabledAdapter {
    pub fn new(id: BackendId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl BackendAdapter for DisabledAdapter {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn query(&self, _request: &AiRequest) -> BackendResult<AiResponse> {
        Err(BackendError::Disabled { backend: self.id })
    }

    fn status(&self) -> HealthStatus {
        HealthStatus {
            available: false,
            response_time_ms: 0,
            last_health_check: None,
            error_count: 0,
            quality_score: 0.0,
            connection_kind: ConnectionKind::None,
        }
    }

    async fn probe(&self) -> bool {
        false
    }
}
