//! Cloud function backend.
//!
//! # Wire format
//! ```text
//! POST {endpoint}  {"requestId", "type", "query", "context"}
//!   ← {"success": true, "response": {"text", "confidence"?, "analysis"?}}
//!   ← {"success": false, "error": "..."}
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::http::HttpTransport;
use crate::backends::{guarded_query, BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};
use crate::config::CloudFunctionConfig;
use crate::health::state::{now_millis, HealthState};
use crate::orchestrator::types::{clamp_confidence, AiRequest, AiResponse, RequestKind};
use crate::resilience::CircuitBreaker;

const DEFAULT_CONFIDENCE: u8 = 75;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionRequest<'a> {
    request_id: &'a str,
    #[serde(rename = "type")]
    kind: RequestKind,
    query: &'a str,
    context: &'a Value,
}

#[derive(Debug, Deserialize)]
struct FunctionReply {
    #[serde(default)]
    success: bool,
    response: Option<FunctionAnswer>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FunctionAnswer {
    text: String,
    confidence: Option<f64>,
    analysis: Option<Value>,
}

/// Adapter for the cloud function endpoint.
#[derive(Debug)]
pub struct CloudFunctionAdapter {
    transport: HttpTransport,
    probe_timeout: Duration,
    breaker: CircuitBreaker,
    health: HealthState,
}

impl CloudFunctionAdapter {
    pub fn new(config: &CloudFunctionConfig) -> BackendResult<Self> {
        let transport = HttpTransport::new(
            BackendId::CloudFunction,
            &config.endpoint,
            &config.health_path,
            Duration::from_millis(config.request_timeout_ms),
            HeaderMap::new(),
        )?;
        Ok(Self {
            transport,
            probe_timeout: config.health.probe_timeout(),
            breaker: CircuitBreaker::new(BackendId::CloudFunction.as_str(), &config.breaker),
            health: HealthState::new(ConnectionKind::RequestResponse, true, config.quality),
        })
    }

    async fn call(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        let started = Instant::now();
        let body = FunctionRequest {
            request_id: &request.request_id,
            kind: request.kind,
            query: &request.query_text,
            context: &request.context_payload,
        };
        let reply: FunctionReply = self.transport.post_json(&body).await?;
        let answer = interpret(reply)?;

        Ok(AiResponse {
            request_id: request.request_id.clone(),
            backend_used: BackendId::CloudFunction,
            text: answer.text,
            confidence: clamp_confidence(answer.confidence, DEFAULT_CONFIDENCE),
            latency_ms: started.elapsed().as_millis() as u64,
            analysis_payload: answer.analysis,
            timestamp: now_millis(),
        })
    }
}

fn interpret(reply: FunctionReply) -> BackendResult<FunctionAnswer> {
    if !reply.success {
        let message = reply.error.unwrap_or_else(|| "function reported failure".to_string());
        return Err(BackendError::transport(BackendId::CloudFunction, message));
    }
    reply
        .response
        .ok_or_else(|| BackendError::invalid(BackendId::CloudFunction, "missing response body"))
}

#[async_trait]
impl BackendAdapter for CloudFunctionAdapter {
    fn id(&self) -> BackendId {
        BackendId::CloudFunction
    }

    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        guarded_query(BackendId::CloudFunction, Some(&self.breaker), &self.health, self.call(request)).await
    }

    fn status(&self) -> HealthStatus {
        self.health.snapshot()
    }

    async fn probe(&self) -> bool {
        let (healthy, latency) = self.transport.check_health(self.probe_timeout).await;
        self.health.record_probe(healthy, latency);
        healthy
    }

    fn circuit_breaker(&self) -> Option<&CircuitBreaker> {
        Some(&self.breaker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let context = serde_json::json!({ "round": 3 });
        let body = FunctionRequest {
            request_id: "cf-1",
            kind: RequestKind::DraftAnalysis,
            query: "who next",
            context: &context,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestId"], "cf-1");
        assert_eq!(json["type"], "draft_analysis");
        assert_eq!(json["context"]["round"], 3);
    }

    #[test]
    fn test_interpret_reply() {
        let ok: FunctionReply = serde_json::from_value(serde_json::json!({
            "success": true,
            "response": { "text": "Take a WR.", "confidence": 81.0, "analysis": { "tier": 2 } }
        }))
        .unwrap();
        let answer = interpret(ok).unwrap();
        assert_eq!(answer.text, "Take a WR.");
        assert_eq!(answer.analysis.unwrap()["tier"], 2);

        let failed: FunctionReply =
            serde_json::from_value(serde_json::json!({ "success": false, "error": "quota" })).unwrap();
        let err = interpret(failed).unwrap_err();
        assert!(err.to_string().contains("quota"));

        let empty: FunctionReply = serde_json::from_value(serde_json::json!({ "success": true })).unwrap();
        assert!(matches!(interpret(empty), Err(BackendError::InvalidResponse { .. })));
    }
}
