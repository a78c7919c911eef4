//! Request and response value objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backends::BackendId;

/// What the caller is asking the assistant to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    DraftAnalysis,
    TradeEvaluation,
    LineupOptimization,
    PlayerComparison,
    FreeForm,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::DraftAnalysis => "draft_analysis",
            RequestKind::TradeEvaluation => "trade_evaluation",
            RequestKind::LineupOptimization => "lineup_optimization",
            RequestKind::PlayerComparison => "player_comparison",
            RequestKind::FreeForm => "free_form",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft_analysis" => Ok(RequestKind::DraftAnalysis),
            "trade_evaluation" => Ok(RequestKind::TradeEvaluation),
            "lineup_optimization" => Ok(RequestKind::LineupOptimization),
            "player_comparison" => Ok(RequestKind::PlayerComparison),
            "free_form" => Ok(RequestKind::FreeForm),
            other => Err(format!("unknown request kind '{}'", other)),
        }
    }
}

/// A caller-supplied request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    /// Correlation key, unique per in-flight request.
    pub request_id: String,
    pub kind: RequestKind,
    /// Opaque structured context forwarded to the backend.
    #[serde(default)]
    pub context_payload: Value,
    pub query_text: String,
}

impl AiRequest {
    pub fn new(request_id: impl Into<String>, kind: RequestKind, query_text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            kind,
            context_payload: Value::Null,
            query_text: query_text.into(),
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context_payload = context;
        self
    }
}

/// Exactly one response is produced per request, even in total failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub request_id: String,
    pub backend_used: BackendId,
    pub text: String,
    /// 0..=100.
    pub confidence: u8,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_payload: Option<Value>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl AiResponse {
    pub fn is_offline(&self) -> bool {
        self.backend_used == BackendId::Offline
    }
}

/// Clamp a backend-reported confidence into 0..=100.
pub(crate) fn clamp_confidence(raw: Option<f64>, default: u8) -> u8 {
    match raw {
        Some(value) if value.is_finite() => value.round().clamp(0.0, 100.0) as u8,
        _ => default,
    }
}
