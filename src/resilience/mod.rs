//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Query or probe for a backend:
//!     → circuit_breaker.rs (fail fast while open, admit trial calls when half-open)
//!     → timeouts.rs (enforce the per-adapter deadline)
//!     → outcome fed back into circuit_breaker.rs
//!
//! Persistent connection dropped:
//!     → backoff.rs (doubling reconnect delay, bounded attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries inside an adapter; the fallback chain is the retry
//! - Circuit breakers are owned per adapter, never global

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitOpenError, CircuitState, Transition,
};
