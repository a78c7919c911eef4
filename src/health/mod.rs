//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Health monitor (monitor.rs), one per adapter:
//!     RecurringTask tick
//!     → circuit breaker gate
//!     → adapter.probe()
//!     → breaker success/failure
//!     → transition? → backoff.rs widens or resets the interval → timer restart
//!
//! Health state (state.rs), one per adapter:
//!     probe and query outcomes → HealthStatus snapshot + quality score
//! ```
//!
//! # Design Decisions
//! - Monitors never touch in-flight request data
//! - Health state is per-adapter, nothing is shared across adapters

pub mod backoff;
pub mod monitor;
pub mod state;

pub use backoff::HealthCheckBackoff;
pub use monitor::{HealthMonitor, ProbeOutcome};
pub use state::{quality_score, HealthState};
