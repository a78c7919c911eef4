//! Synthetic answers for when every backend is exhausted.

use std::time::Duration;

use crate::backends::BackendId;
use crate::health::state::now_millis;
use crate::observability::metrics;
use crate::orchestrator::types::{AiRequest, AiResponse, RequestKind};

/// Confidence carried by every offline response.
pub const OFFLINE_CONFIDENCE: u8 = 10;

/// Static advisory text for a request kind.
pub fn advisory_text(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::DraftAnalysis => {
            "AI analysis is offline. Draft by your pre-ranked board: take the best available \
             player at the top of your tiers and fill scarce positions before depth."
        }
        RequestKind::TradeEvaluation => {
            "AI analysis is offline. Compare projected weekly points for both sides and favor \
             the side that improves your starting lineup rather than your bench."
        }
        RequestKind::LineupOptimization => {
            "AI analysis is offline. Start players with the highest projections, check injury \
             reports and bye weeks, and avoid late-game players you cannot replace."
        }
        RequestKind::PlayerComparison => {
            "AI analysis is offline. Compare recent target or touch share, matchup strength and \
             health status; prefer the steadier floor when the projections are close."
        }
        RequestKind::FreeForm => {
            "AI assistance is temporarily unavailable. Please try again shortly."
        }
    }
}

/// Build the degraded-mode response for `request`.
pub fn offline_response(request: &AiRequest, elapsed: Duration) -> AiResponse {
    metrics::record_offline_response(request.kind.as_str());
    AiResponse {
        request_id: request.request_id.clone(),
        backend_used: BackendId::Offline,
        text: advisory_text(request.kind).to_string(),
        confidence: OFFLINE_CONFIDENCE,
        latency_ms: elapsed.as_millis() as u64,
        analysis_payload: None,
        timestamp: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response_shape() {
        let request = AiRequest::new("req-offline", RequestKind::TradeEvaluation, "Should I trade?");
        let response = offline_response(&request, Duration::from_millis(12));
        assert_eq!(response.request_id, "req-offline");
        assert!(response.is_offline());
        assert_eq!(response.confidence, OFFLINE_CONFIDENCE);
        assert_eq!(response.latency_ms, 12);
        assert_eq!(response.text, advisory_text(RequestKind::TradeEvaluation));
    }

    #[test]
    fn test_text_differs_by_kind() {
        assert_ne!(
            advisory_text(RequestKind::DraftAnalysis),
            advisory_text(RequestKind::LineupOptimization)
        );
    }
}
