//! Backend identities, health records and error definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a backend integration.
///
/// `Offline` names the synthetic pseudo-backend that answers when every
/// real backend is exhausted. It never appears in a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    Primary,
    LocalBridge,
    CloudFunction,
    Specialist,
    Offline,
}

impl BackendId {
    /// All real backends, in default chain order.
    pub const REAL: [BackendId; 4] = [
        BackendId::Primary,
        BackendId::LocalBridge,
        BackendId::CloudFunction,
        BackendId::Specialist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Primary => "primary",
            BackendId::LocalBridge => "local_bridge",
            BackendId::CloudFunction => "cloud_function",
            BackendId::Specialist => "specialist",
            BackendId::Offline => "offline",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an adapter talks to its backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    PersistentSocket,
    RequestResponse,
    None,
}

/// Last-known health of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub response_time_ms: u64,
    /// Milliseconds since the Unix epoch, `None` before the first probe.
    pub last_health_check: Option<u64>,
    pub error_count: u32,
    pub quality_score: f64,
    pub connection_kind: ConnectionKind,
}

impl HealthStatus {
    /// Constant status reported for the offline pseudo-backend.
    pub fn offline() -> Self {
        Self {
            available: true,
            response_time_ms: 0,
            last_health_check: None,
            error_count: 0,
            quality_score: 0.0,
            connection_kind: ConnectionKind::None,
        }
    }
}

/// Errors raised by a backend adapter.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No response within the call's deadline.
    #[error("{backend} timed out after {timeout_ms}ms")]
    Timeout { backend: BackendId, timeout_ms: u64 },

    /// Connection refused, protocol mismatch or non-success status.
    #[error("{backend} transport error: {message}")]
    Transport { backend: BackendId, message: String },

    /// Fast-fail: the breaker is open and no network call was made.
    #[error("{backend} circuit open, retry in {}ms", retry_in.as_millis())]
    CircuitOpen { backend: BackendId, retry_in: Duration },

    /// Persistent connection dropped while a request was waiting.
    #[error("{backend} connection lost")]
    ConnectionLost { backend: BackendId },

    /// Backend turned off by configuration.
    #[error("{backend} is disabled")]
    Disabled { backend: BackendId },

    /// The backend answered but the payload could not be understood.
    #[error("{backend} returned an invalid response: {message}")]
    InvalidResponse { backend: BackendId, message: String },
}

impl BackendError {
    pub fn transport(backend: BackendId, message: impl Into<String>) -> Self {
        BackendError::Transport {
            backend,
            message: message.into(),
        }
    }

    pub fn invalid(backend: BackendId, message: impl Into<String>) -> Self {
        BackendError::InvalidResponse {
            backend,
            message: message.into(),
        }
    }

    /// True when the call was rejected without touching the network.
    pub fn is_fast_fail(&self) -> bool {
        matches!(self, BackendError::CircuitOpen { .. } | BackendError::Disabled { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout { .. } => "timeout",
            BackendError::Transport { .. } => "transport",
            BackendError::CircuitOpen { .. } => "circuit_open",
            BackendError::ConnectionLost { .. } => "connection_lost",
            BackendError::Disabled { .. } => "disabled",
            BackendError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Result type for adapter operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_serde_names() {
        let json = serde_json::to_string(&BackendId::LocalBridge).unwrap();
        assert_eq!(json, "\"local_bridge\"");
        let id: BackendId = serde_json::from_str("\"cloud_function\"").unwrap();
        assert_eq!(id, BackendId::CloudFunction);
        assert_eq!(BackendId::Offline.to_string(), "offline");
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Timeout {
            backend: BackendId::Specialist,
            timeout_ms: 30000,
        };
        assert_eq!(err.to_string(), "specialist timed out after 30000ms");

        let err = BackendError::CircuitOpen {
            backend: BackendId::LocalBridge,
            retry_in: Duration::from_millis(1500),
        };
        assert!(err.is_fast_fail());
        assert!(err.to_string().contains("1500ms"));
    }
}
