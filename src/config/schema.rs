//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! orchestrator. All types derive Serde traits for deserialization from
//! config files, and every field has a default so partial files are valid.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backends::BackendId;

/// Root configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Chain order and advisory quality thresholds.
    pub fallback: FallbackConfig,

    /// Status broadcast settings.
    pub status: StatusConfig,

    /// Primary conversational backend.
    pub primary: PrimaryConfig,

    /// Locally hosted bridge reached over a WebSocket.
    pub local_bridge: LocalBridgeConfig,

    /// Cloud function endpoint.
    pub cloud_function: CloudFunctionConfig,

    /// Large-context specialist backend.
    pub specialist: SpecialistConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin HTTP surface.
    pub admin: AdminConfig,
}

/// Fallback chain configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Backends tried in order for every live query.
    pub chain: Vec<BackendId>,

    /// Minimum quality score for advisory "best backend" selection.
    /// Backends missing from the map use `default_min_quality`.
    pub min_quality: BTreeMap<BackendId, f64>,

    pub default_min_quality: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        let min_quality = BTreeMap::from([
            (BackendId::Primary, 70.0),
            (BackendId::LocalBridge, 60.0),
            (BackendId::CloudFunction, 50.0),
            (BackendId::Specialist, 60.0),
        ]);
        Self {
            chain: BackendId::REAL.to_vec(),
            min_quality,
            default_min_quality: 50.0,
        }
    }
}

impl FallbackConfig {
    pub fn threshold_for(&self, backend: BackendId) -> f64 {
        self.min_quality
            .get(&backend)
            .copied()
            .unwrap_or(self.default_min_quality)
    }
}

/// Status publisher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Broadcast interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures (while closed) that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting trial calls.
    pub timeout_ms: u64,

    /// Trial calls admitted (and successes required) while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_ms: 60_000,
            half_open_max_calls: 3,
        }
    }
}

/// Health monitor settings for one adapter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval while the backend is healthy.
    pub base_interval_ms: u64,

    /// Upper bound for the backed-off interval.
    pub max_interval_ms: u64,

    /// Interval growth factor applied each time the circuit opens.
    pub multiplier: f64,

    /// Log every Nth consecutive probe failure at warn level.
    pub log_sample_every: u32,

    /// Timeout for one probe.
    pub probe_timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 30_000,
            max_interval_ms: 300_000,
            multiplier: 2.0,
            log_sample_every: 10,
            probe_timeout_ms: 5_000,
        }
    }
}

impl HealthCheckConfig {
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Latency and error weighting for an adapter's quality score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Milliseconds of response time that cost one quality point.
    pub latency_ms_per_point: f64,

    /// Points lost per recorded error.
    pub error_penalty: f64,

    /// Maximum points lost to errors.
    pub max_error_penalty: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            latency_ms_per_point: 100.0,
            error_penalty: 10.0,
            max_error_penalty: 50.0,
        }
    }
}

/// Primary conversational backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrimaryConfig {
    pub enabled: bool,

    /// Chat completions endpoint.
    pub endpoint: String,

    /// Path probed by the health monitor, relative to `endpoint`'s origin.
    pub health_path: String,

    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub temperature: f64,

    pub request_timeout_ms: u64,

    pub health: HealthCheckConfig,

    pub quality: QualityConfig,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8400/v1/chat/completions".to_string(),
            health_path: "/health".to_string(),
            model: "assistant-default".to_string(),
            api_key_env: "PRIMARY_API_KEY".to_string(),
            temperature: 0.7,
            request_timeout_ms: 30_000,
            health: HealthCheckConfig::default(),
            quality: QualityConfig {
                latency_ms_per_point: 100.0,
                error_penalty: 15.0,
                max_error_penalty: 60.0,
            },
        }
    }
}

/// Local bridge reached over a persistent WebSocket.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalBridgeConfig {
    pub enabled: bool,

    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,

    pub request_timeout_ms: u64,

    pub connect_timeout_ms: u64,

    pub max_reconnect_attempts: u32,

    pub reconnect_base_delay_ms: u64,

    pub reconnect_max_delay_ms: u64,

    pub breaker: BreakerConfig,

    pub health: HealthCheckConfig,

    pub quality: QualityConfig,
}

impl Default for LocalBridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://127.0.0.1:8765".to_string(),
            request_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            breaker: BreakerConfig {
                failure_threshold: 3,
                timeout_ms: 30_000,
                half_open_max_calls: 2,
            },
            health: HealthCheckConfig {
                base_interval_ms: 10_000,
                max_interval_ms: 120_000,
                multiplier: 2.0,
                log_sample_every: 10,
                probe_timeout_ms: 3_000,
            },
            quality: QualityConfig {
                latency_ms_per_point: 50.0,
                error_penalty: 10.0,
                max_error_penalty: 50.0,
            },
        }
    }
}

/// Cloud function endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudFunctionConfig {
    pub enabled: bool,

    pub endpoint: String,

    pub health_path: String,

    pub request_timeout_ms: u64,

    pub breaker: BreakerConfig,

    pub health: HealthCheckConfig,

    pub quality: QualityConfig,
}

impl Default for CloudFunctionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8888/.netlify/functions/ai-analysis".to_string(),
            health_path: "/.netlify/functions/health".to_string(),
            request_timeout_ms: 15_000,
            breaker: BreakerConfig::default(),
            health: HealthCheckConfig::default(),
            quality: QualityConfig {
                latency_ms_per_point: 200.0,
                error_penalty: 10.0,
                max_error_penalty: 50.0,
            },
        }
    }
}

/// Large-context specialist backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpecialistConfig {
    pub enabled: bool,

    pub endpoint: String,

    pub health_path: String,

    pub model: String,

    pub api_key_env: String,

    pub max_tokens: u32,

    pub request_timeout_ms: u64,

    pub breaker: BreakerConfig,

    pub health: HealthCheckConfig,

    pub quality: QualityConfig,
}

impl Default for SpecialistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8500/v1/messages".to_string(),
            health_path: "/health".to_string(),
            model: "specialist-long-context".to_string(),
            api_key_env: "SPECIALIST_API_KEY".to_string(),
            max_tokens: 4096,
            request_timeout_ms: 30_000,
            breaker: BreakerConfig {
                failure_threshold: 5,
                timeout_ms: 60_000,
                half_open_max_calls: 2,
            },
            health: HealthCheckConfig::default(),
            quality: QualityConfig {
                latency_ms_per_point: 150.0,
                error_penalty: 10.0,
                max_error_penalty: 50.0,
            },
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin/query HTTP server.
    pub enabled: bool,

    /// Bind address for the admin server.
    pub bind_address: String,

    /// Upper bound on one admin request, including `/query`.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 180,
        }
    }
}
