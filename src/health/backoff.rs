//! Health-check interval backoff.
//!
//! The probe interval grows by `multiplier` (capped at `max`) each time the
//! adapter's circuit opens and snaps back to `base` when it recovers. It is
//! never touched while the circuit sits in a steady state.

use std::time::Duration;

use crate::config::HealthCheckConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckBackoff {
    base: Duration,
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl HealthCheckBackoff {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let base = config.base_interval();
        Self {
            base,
            current: base,
            max: config.max_interval().max(base),
            multiplier: config.multiplier.max(1.0),
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Circuit opened: widen the interval. Returns true if it changed.
    pub fn on_open(&mut self) -> bool {
        let next = self.current.mul_f64(self.multiplier).min(self.max);
        let changed = next != self.current;
        self.current = next;
        changed
    }

    /// Circuit recovered: reset the interval. Returns true if it changed.
    pub fn on_recovery(&mut self) -> bool {
        let changed = self.current != self.base;
        self.current = self.base;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            base_interval_ms: 1000,
            max_interval_ms: 5000,
            multiplier: 2.0,
            ..HealthCheckConfig::default()
        }
    }

    #[test]
    fn test_grows_and_caps() {
        let mut backoff = HealthCheckBackoff::new(&config());
        assert_eq!(backoff.current(), Duration::from_secs(1));
        assert!(backoff.on_open());
        assert_eq!(backoff.current(), Duration::from_secs(2));
        backoff.on_open();
        assert_eq!(backoff.current(), Duration::from_secs(4));
        assert!(backoff.on_open());
        assert_eq!(backoff.current(), Duration::from_secs(5));
        assert!(!backoff.on_open());
        assert_eq!(backoff.current(), Duration::from_secs(5));
    }

    #[test]
    fn test_recovery_resets() {
        let mut backoff = HealthCheckBackoff::new(&config());
        assert!(!backoff.on_recovery());
        backoff.on_open();
        backoff.on_open();
        assert!(backoff.on_recovery());
        assert_eq!(backoff.current(), backoff.base());
    }
}
