//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → build adapters → orchestrator + publisher → start()
//!         → one RecurringTask per health monitor
//!         → one RecurringTask for the status publisher
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every loop exits → adapters closed
//! ```
//!
//! # Design Decisions
//! - Every loop is a RecurringTask (schedule.rs) with a cancellable handle
//! - A timer whose period changes is rebuilt, not rescheduled

pub mod schedule;
pub mod shutdown;
pub mod startup;

pub use schedule::{RecurringTask, Reschedule};
pub use shutdown::Shutdown;
pub use startup::{AssistantRuntime, MonitoredAdapter, StartupError};
