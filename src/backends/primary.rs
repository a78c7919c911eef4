//! Primary conversational backend (chat-completions style).
//!
//! The primary adapter does not own a circuit breaker. A failed query marks
//! it unavailable, and the next successful health probe brings it back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::backends::http::HttpTransport;
use crate::backends::prompt::{system_prompt, user_prompt};
use crate::backends::{guarded_query, BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};
use crate::config::PrimaryConfig;
use crate::health::state::{now_millis, HealthState};
use crate::orchestrator::types::{AiRequest, AiResponse};

const DEFAULT_CONFIDENCE: u8 = 85;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Adapter for the primary conversational backend.
#[derive(Debug)]
pub struct PrimaryAdapter {
    transport: HttpTransport,
    model: String,
    temperature: f64,
    probe_timeout: Duration,
    health: HealthState,
}

impl PrimaryAdapter {
    pub fn new(config: &PrimaryConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        match std::env::var(&config.api_key_env) {
            Ok(key) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|_| BackendError::transport(BackendId::Primary, "API key is not a valid header value"))?;
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!(env = %config.api_key_env, "Primary API key not set, sending unauthenticated requests");
            }
        }

        let transport = HttpTransport::new(
            BackendId::Primary,
            &config.endpoint,
            &config.health_path,
            Duration::from_millis(config.request_timeout_ms),
            headers,
        )?;

        Ok(Self {
            transport,
            model: config.model.clone(),
            temperature: config.temperature,
            probe_timeout: config.health.probe_timeout(),
            health: HealthState::new(ConnectionKind::RequestResponse, true, config.quality),
        })
    }

    async fn call(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        let started = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(request.kind).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(request),
                },
            ],
            temperature: self.temperature,
        };

        let completion: ChatCompletion = self.transport.post_json(&body).await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BackendError::invalid(BackendId::Primary, "completion had no content"))?;

        Ok(AiResponse {
            request_id: request.request_id.clone(),
            backend_used: BackendId::Primary,
            text,
            confidence: DEFAULT_CONFIDENCE,
            latency_ms: started.elapsed().as_millis() as u64,
            analysis_payload: None,
            timestamp: now_millis(),
        })
    }
}

#[async_trait]
impl BackendAdapter for PrimaryAdapter {
    fn id(&self) -> BackendId {
        BackendId::Primary
    }

    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        guarded_query(BackendId::Primary, None, &self.health, self.call(request)).await
    }

    fn status(&self) -> HealthStatus {
        self.health.snapshot()
    }

    async fn probe(&self) -> bool {
        let (healthy, latency) = self.transport.check_health(self.probe_timeout).await;
        self.health.record_probe(healthy, latency);
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            temperature: 0.5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.5);
    }

    #[test]
    fn test_completion_parse() {
        let completion: ChatCompletion = serde_json::from_value(serde_json::json!({
            "id": "x",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Draft Bijan." } }]
        }))
        .unwrap();
        assert_eq!(completion.choices[0].message.content, "Draft Bijan.");
    }

    #[tokio::test]
    async fn test_failure_marks_unavailable() {
        let config = PrimaryConfig {
            endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
            request_timeout_ms: 1000,
            ..PrimaryConfig::default()
        };
        let adapter = PrimaryAdapter::new(&config).unwrap();
        assert!(adapter.status().available);

        let request = AiRequest::new("p-1", crate::orchestrator::types::RequestKind::FreeForm, "hi");
        assert!(adapter.query(&request).await.is_err());
        let status = adapter.status();
        assert!(!status.available);
        assert_eq!(status.error_count, 1);
        assert!(adapter.circuit_breaker().is_none());
    }
}
