//! Reconnect backoff for persistent connections.
//!
//! Delays double from `base_delay` up to `max_delay`, with up to 10% jitter
//! so that several processes sharing one bridge do not reconnect in lockstep.

use std::time::Duration;
use rand::Rng;

/// Bounded exponential reconnect schedule.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), without jitter.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn base_delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        let delay = self.base_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }

    /// Delay before reconnect attempt `attempt` with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        let delay = self.base_delay_for(attempt)?;
        let jitter_range = delay.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };
        Some(delay + Duration::from_millis(jitter))
    }
}
