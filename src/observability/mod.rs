//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Adapters, health monitors, orchestrator:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates are free when no recorder is installed
//! - Request id is attached to every orchestrator log line

pub mod logging;
pub mod metrics;
