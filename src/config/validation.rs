//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds ≥ 1, timeouts > 0, multiplier ≥ 1)
//! - Check the fallback chain (non-empty, no duplicates, no offline entry)
//! - Check endpoint URLs and schemes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::backends::BackendId;
use crate::config::schema::{
    BreakerConfig, FallbackConfig, HealthCheckConfig, OrchestratorConfig,
};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("fallback chain is empty")]
    EmptyChain,

    #[error("fallback chain lists {0} more than once")]
    DuplicateChainEntry(BackendId),

    #[error("fallback chain may not contain the offline pseudo-backend")]
    OfflineInChain,

    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field}: base interval {base_ms}ms exceeds max interval {max_ms}ms")]
    IntervalOrder {
        field: String,
        base_ms: u64,
        max_ms: u64,
    },

    #[error("{field}: invalid URL '{url}'")]
    InvalidUrl { field: String, url: String },

    #[error("{field}: unsupported scheme '{scheme}'")]
    UnsupportedScheme { field: String, scheme: String },
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_fallback(&config.fallback, &mut errors);

    if config.status.interval_ms == 0 {
        errors.push(not_positive("status.interval_ms"));
    }

    let primary = &config.primary;
    if primary.enabled {
        check_url("primary.endpoint", &primary.endpoint, &["http", "https"], &mut errors);
    }
    check_positive("primary.request_timeout_ms", primary.request_timeout_ms, &mut errors);
    validate_health("primary.health", &primary.health, &mut errors);

    let bridge = &config.local_bridge;
    if bridge.enabled {
        check_url("local_bridge.url", &bridge.url, &["ws", "wss"], &mut errors);
    }
    check_positive("local_bridge.request_timeout_ms", bridge.request_timeout_ms, &mut errors);
    check_positive("local_bridge.connect_timeout_ms", bridge.connect_timeout_ms, &mut errors);
    check_positive("local_bridge.reconnect_base_delay_ms", bridge.reconnect_base_delay_ms, &mut errors);
    validate_breaker("local_bridge.breaker", &bridge.breaker, &mut errors);
    validate_health("local_bridge.health", &bridge.health, &mut errors);

    let cloud = &config.cloud_function;
    if cloud.enabled {
        check_url("cloud_function.endpoint", &cloud.endpoint, &["http", "https"], &mut errors);
    }
    check_positive("cloud_function.request_timeout_ms", cloud.request_timeout_ms, &mut errors);
    validate_breaker("cloud_function.breaker", &cloud.breaker, &mut errors);
    validate_health("cloud_function.health", &cloud.health, &mut errors);

    let specialist = &config.specialist;
    if specialist.enabled {
        check_url("specialist.endpoint", &specialist.endpoint, &["http", "https"], &mut errors);
    }
    check_positive("specialist.request_timeout_ms", specialist.request_timeout_ms, &mut errors);
    validate_breaker("specialist.breaker", &specialist.breaker, &mut errors);
    validate_health("specialist.health", &specialist.health, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate only the fallback section (used for hot reload).
pub fn validate_fallback_config(fallback: &FallbackConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    validate_fallback(fallback, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_fallback(fallback: &FallbackConfig, errors: &mut Vec<ValidationError>) {
    if fallback.chain.is_empty() {
        errors.push(ValidationError::EmptyChain);
    }

    let mut seen = HashSet::new();
    for backend in &fallback.chain {
        if *backend == BackendId::Offline {
            errors.push(ValidationError::OfflineInChain);
        } else if !seen.insert(*backend) {
            errors.push(ValidationError::DuplicateChainEntry(*backend));
        }
    }

    for (backend, threshold) in &fallback.min_quality {
        check_score(&format!("fallback.min_quality.{}", backend), *threshold, errors);
    }
    check_score("fallback.default_min_quality", fallback.default_min_quality, errors);
}

fn validate_breaker(field: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    check_positive(&format!("{}.failure_threshold", field), u64::from(breaker.failure_threshold), errors);
    check_positive(&format!("{}.timeout_ms", field), breaker.timeout_ms, errors);
    check_positive(&format!("{}.half_open_max_calls", field), u64::from(breaker.half_open_max_calls), errors);
}

fn validate_health(field: &str, health: &HealthCheckConfig, errors: &mut Vec<ValidationError>) {
    check_positive(&format!("{}.base_interval_ms", field), health.base_interval_ms, errors);
    check_positive(&format!("{}.probe_timeout_ms", field), health.probe_timeout_ms, errors);
    check_positive(&format!("{}.log_sample_every", field), u64::from(health.log_sample_every), errors);

    if health.base_interval_ms > health.max_interval_ms {
        errors.push(ValidationError::IntervalOrder {
            field: field.to_string(),
            base_ms: health.base_interval_ms,
            max_ms: health.max_interval_ms,
        });
    }
    if !(health.multiplier >= 1.0 && health.multiplier.is_finite()) {
        errors.push(ValidationError::OutOfRange {
            field: format!("{}.multiplier", field),
            min: 1.0,
            max: f64::MAX,
            value: health.multiplier,
        });
    }
}

fn check_positive(field: &str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(not_positive(field));
    }
}

fn check_score(field: &str, value: f64, errors: &mut Vec<ValidationError>) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: 100.0,
            value,
        });
    }
}

fn check_url(field: &str, raw: &str, schemes: &[&str], errors: &mut Vec<ValidationError>) {
    match Url::parse(raw) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::UnsupportedScheme {
            field: field.to_string(),
            scheme: url.scheme().to_string(),
        }),
        Err(_) => errors.push(ValidationError::InvalidUrl {
            field: field.to_string(),
            url: raw.to_string(),
        }),
    }
}

fn not_positive(field: &str) -> ValidationError {
    ValidationError::NotPositive {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&OrchestratorConfig::default()), Ok(()));
    }

    #[test]
    fn test_chain_errors_are_all_reported() {
        let mut config = OrchestratorConfig::default();
        config.fallback.chain = vec![
            BackendId::Primary,
            BackendId::Primary,
            BackendId::Offline,
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateChainEntry(BackendId::Primary)));
        assert!(errors.contains(&ValidationError::OfflineInChain));

        config.fallback.chain.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyChain]);
    }

    #[test]
    fn test_range_checks() {
        let mut config = OrchestratorConfig::default();
        config.local_bridge.breaker.failure_threshold = 0;
        config.cloud_function.health.multiplier = 0.5;
        config.specialist.health.base_interval_ms = 500_000;
        config.fallback.min_quality.insert(BackendId::Primary, 120.0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors.iter().any(|e| e.to_string().contains("local_bridge.breaker.failure_threshold")));
        assert!(errors.iter().any(|e| e.to_string().contains("cloud_function.health.multiplier")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::IntervalOrder { .. })));
    }

    #[test]
    fn test_bridge_requires_websocket_scheme() {
        let mut config = OrchestratorConfig::default();
        config.local_bridge.url = "http://127.0.0.1:8765".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnsupportedScheme {
                field: "local_bridge.url".to_string(),
                scheme: "http".to_string(),
            }]
        );

        config.local_bridge.enabled = false;
        assert_eq!(validate_config(&config), Ok(()));
    }
}
