use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::backends::BackendId;
use crate::http::server::AppState;
use crate::orchestrator::{AiRequest, AiResponse};
use crate::resilience::BreakerSnapshot;
use crate::status::StatusMap;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BestBackend {
    pub backend: BackendId,
    pub chain: Vec<BackendId>,
}

pub async fn get_health() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusMap> {
    Json(state.runtime.current_status())
}

pub async fn get_circuit_breakers(State(state): State<AppState>) -> Json<BTreeMap<BackendId, BreakerSnapshot>> {
    Json(state.runtime.circuit_breaker_snapshot())
}

pub async fn get_best_backend(State(state): State<AppState>) -> Json<BestBackend> {
    Json(BestBackend {
        backend: state.runtime.best_backend(),
        chain: state.runtime.orchestrator().chain(),
    })
}

/// Always 200: the runtime answers offline rather than failing.
pub async fn post_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<AiRequest>,
) -> Json<AiResponse> {
    if request.request_id.is_empty() {
        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            request.request_id = id.to_string();
        }
    }
    tracing::debug!(request_id = %request.request_id, kind = %request.kind, "Query received");
    Json(state.runtime.submit(&request).await)
}
