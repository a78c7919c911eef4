//! Shared mocks for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assistant_orchestrator::backends::{
    BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus,
};
use assistant_orchestrator::config::{BreakerConfig, HealthCheckConfig, QualityConfig};
use assistant_orchestrator::health::HealthState;
use assistant_orchestrator::orchestrator::{AiRequest, AiResponse};
use assistant_orchestrator::resilience::CircuitBreaker;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// In-process adapter whose query and probe outcomes are scripted.
pub struct ScriptedAdapter {
    id: BackendId,
    query_ok: AtomicBool,
    probe_ok: AtomicBool,
    calls: AtomicU32,
    probes: AtomicU32,
    breaker: CircuitBreaker,
    health: HealthState,
}

impl ScriptedAdapter {
    pub fn new(id: BackendId, breaker: BreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            id,
            query_ok: AtomicBool::new(true),
            probe_ok: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            breaker: CircuitBreaker::new(id.as_str(), &breaker),
            health: HealthState::new(ConnectionKind::RequestResponse, true, QualityConfig::default()),
        })
    }

    pub fn healthy(id: BackendId) -> Arc<Self> {
        Self::new(id, BreakerConfig::default())
    }

    pub fn set_query_ok(&self, ok: bool) {
        self.query_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_probe_ok(&self, ok: bool) {
        self.probe_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.health.set_available(available);
    }

    /// Number of times `query` reached the backend.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Drive the breaker open with consecutive failures.
    pub fn trip(&self, failures: u32) {
        for _ in 0..failures {
            self.breaker.record_failure();
        }
    }
}

#[async_trait]
impl BackendAdapter for ScriptedAdapter {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.query_ok.load(Ordering::SeqCst) {
            self.health.record_query_failure();
            self.breaker.record_failure();
            return Err(BackendError::transport(self.id, "scripted failure"));
        }
        self.health.record_query_success(Duration::from_millis(5));
        self.breaker.record_success();
        Ok(AiResponse {
            request_id: request.request_id.clone(),
            backend_used: self.id,
            text: format!("{} answer", self.id),
            confidence: 80,
            latency_ms: 5,
            analysis_payload: None,
            timestamp: 0,
        })
    }

    fn status(&self) -> HealthStatus {
        self.health.snapshot()
    }

    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let healthy = self.probe_ok.load(Ordering::SeqCst);
        self.health.record_probe(healthy, Duration::from_millis(5));
        healthy
    }

    fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        Some(&self.breaker)
    }
}

pub fn health_config(base_ms: u64, max_ms: u64) -> HealthCheckConfig {
    HealthCheckConfig {
        base_interval_ms: base_ms,
        max_interval_ms: max_ms,
        multiplier: 2.0,
        log_sample_every: 10,
        probe_timeout_ms: 500,
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Handle to a mock request-response backend.
#[derive(Clone)]
pub struct MockHttpBackend {
    pub addr: SocketAddr,
    pub healthy: Arc<AtomicBool>,
    pub calls: Arc<AtomicU32>,
}

impl MockHttpBackend {
    pub fn endpoint(&self) -> String {
        format!("http://{}/ai", self.addr)
    }
}

async fn mock_health(State(backend): State<MockHttpBackend>) -> StatusCode {
    if backend.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Speaks the cloud function format. Queries containing "fail" get a 500,
/// queries containing "slow" are answered after two seconds.
async fn mock_cloud_function(State(backend): State<MockHttpBackend>, Json(body): Json<Value>) -> Response {
    backend.calls.fetch_add(1, Ordering::SeqCst);
    let query = body["query"].as_str().unwrap_or_default().to_string();
    if query.contains("fail") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if query.contains("slow") {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Json(json!({
        "success": true,
        "response": {
            "text": format!("cloud answer to {}", query),
            "confidence": 70,
            "analysis": { "echo": body["requestId"] }
        }
    }))
    .into_response()
}

pub async fn start_cloud_function() -> MockHttpBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = MockHttpBackend {
        addr: listener.local_addr().unwrap(),
        healthy: Arc::new(AtomicBool::new(true)),
        calls: Arc::new(AtomicU32::new(0)),
    };
    let router = Router::new()
        .route("/health", get(mock_health))
        .route("/ai", post(mock_cloud_function))
        .with_state(backend.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    backend
}

/// Handle to a mock local bridge.
#[derive(Clone)]
pub struct MockBridge {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicU32>,
}

impl MockBridge {
    pub fn url(&self) -> String {
        format!("ws://{}/bridge", self.addr)
    }
}

async fn bridge_upgrade(State(bridge): State<MockBridge>, ws: WebSocketUpgrade) -> Response {
    bridge.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(bridge_session)
}

/// Queries containing "silent" are never answered, "drop" closes the socket,
/// "error" gets an error envelope and "slow" is answered after 800ms.
/// Everything else is answered at once.
async fn bridge_session(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else { continue };

        let reply = match frame["type"].as_str() {
            Some("ping") => json!({ "type": "pong", "timestamp": frame["timestamp"] }),
            Some("ai_request") => {
                let request_id = frame["requestId"].clone();
                let query = frame["payload"]["query"].as_str().unwrap_or_default().to_string();
                if query.contains("silent") {
                    continue;
                }
                if query.contains("drop") {
                    return;
                }
                if query.contains("slow") {
                    tokio::time::sleep(Duration::from_millis(800)).await;
                }
                if query.contains("error") {
                    json!({ "type": "error", "requestId": request_id, "error": "model not loaded" })
                } else {
                    json!({
                        "type": "ai_response",
                        "requestId": request_id,
                        "text": format!("bridge answer to {}", query),
                        "confidence": 66,
                        "analysis": { "kind": frame["payload"]["kind"] }
                    })
                }
            }
            _ => continue,
        };

        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
            return;
        }
    }
}

pub async fn start_bridge() -> MockBridge {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let bridge = MockBridge {
        addr: listener.local_addr().unwrap(),
        connections: Arc::new(AtomicU32::new(0)),
    };
    let router = Router::new()
        .route("/bridge", get(bridge_upgrade))
        .with_state(bridge.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    bridge
}

/// Serve an arbitrary router on an ephemeral port.
pub async fn start_router(router: Router) -> SocketAddr {
    serve(router).await
}
