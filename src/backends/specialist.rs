//! Large-context specialist backend (messages style).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::backends::http::HttpTransport;
use crate::backends::prompt::{system_prompt, user_prompt};
use crate::backends::{guarded_query, BackendAdapter, BackendError, BackendId, BackendResult, ConnectionKind, HealthStatus};
use crate::config::SpecialistConfig;
use crate::health::state::{now_millis, HealthState};
use crate::orchestrator::types::{AiRequest, AiResponse};
use crate::resilience::CircuitBreaker;

const DEFAULT_CONFIDENCE: u8 = 90;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<UserMessage>,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Join the text blocks of a reply.
fn collect_text(reply: MessagesReply) -> Option<String> {
    let text = reply
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Adapter for the large-context specialist.
#[derive(Debug)]
pub struct SpecialistAdapter {
    transport: HttpTransport,
    model: String,
    max_tokens: u32,
    probe_timeout: Duration,
    breaker: CircuitBreaker,
    health: HealthState,
}

impl SpecialistAdapter {
    pub fn new(config: &SpecialistConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        match std::env::var(&config.api_key_env) {
            Ok(key) => {
                let value = HeaderValue::from_str(&key)
                    .map_err(|_| BackendError::transport(BackendId::Specialist, "API key is not a valid header value"))?;
                headers.insert("x-api-key", value);
            }
            Err(_) => {
                tracing::warn!(env = %config.api_key_env, "Specialist API key not set, sending unauthenticated requests");
            }
        }

        let transport = HttpTransport::new(
            BackendId::Specialist,
            &config.endpoint,
            &config.health_path,
            Duration::from_millis(config.request_timeout_ms),
            headers,
        )?;

        Ok(Self {
            transport,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            probe_timeout: config.health.probe_timeout(),
            breaker: CircuitBreaker::new(BackendId::Specialist.as_str(), &config.breaker),
            health: HealthState::new(ConnectionKind::RequestResponse, true, config.quality),
        })
    }

    async fn call(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        let started = Instant::now();
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt(request.kind),
            messages: vec![UserMessage {
                role: "user",
                content: user_prompt(request),
            }],
        };
        let reply: MessagesReply = self.transport.post_json(&body).await?;
        let text = collect_text(reply)
            .ok_or_else(|| BackendError::invalid(BackendId::Specialist, "reply had no text blocks"))?;

        Ok(AiResponse {
            request_id: request.request_id.clone(),
            backend_used: BackendId::Specialist,
            text,
            confidence: DEFAULT_CONFIDENCE,
            latency_ms: started.elapsed().as_millis() as u64,
            analysis_payload: None,
            timestamp: now_millis(),
        })
    }
}

#[async_trait]
impl BackendAdapter for SpecialistAdapter {
    fn id(&self) -> BackendId {
        BackendId::Specialist
    }

    async fn query(&self, request: &AiRequest) -> BackendResult<AiResponse> {
        guarded_query(BackendId::Specialist, Some(&self.breaker), &self.health, self.call(request)).await
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
