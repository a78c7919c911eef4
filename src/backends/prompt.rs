//! Prompt assembly shared by the text-in/text-out adapters.

use serde_json::Value;

use crate::orchestrator::types::{AiRequest, RequestKind};

/// System instruction for a request kind.
pub fn system_prompt(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::DraftAnalysis => {
            "You are a fantasy football draft analyst. Recommend picks using positional \
             scarcity, tier breaks and roster construction. Be concise and concrete."
        }
        RequestKind::TradeEvaluation => {
            "You are a fantasy football trade evaluator. Compare the value exchanged, \
             roster fit and schedule, then state clearly whether to accept."
        }
        RequestKind::LineupOptimization => {
            "You are a fantasy football lineup optimizer. Choose starters from the given \
             roster using matchups, projections and injury status."
        }
        RequestKind::PlayerComparison => {
            "You are a fantasy football analyst comparing players. Weigh usage, efficiency \
             and outlook, and name the better option."
        }
        RequestKind::FreeForm => "You are a helpful fantasy football assistant.",
    }
}

/// User message: the query, followed by the context payload when present.
pub fn user_prompt(request: &AiRequest) -> String {
    match &request.context_payload {
        Value::Null => request.query_text.clone(),
        context => {
            let rendered = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
            format!("{}\n\nContext:\n{}", request.query_text, rendered)
        }
    }
}
