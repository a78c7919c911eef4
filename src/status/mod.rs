//! Status broadcasting.
//!
//! # Data Flow
//! ```text
//! RecurringTask tick (every status.interval_ms)
//!     → adapter.status() for every adapter + offline pseudo-status
//!     → one BTreeMap<BackendId, HealthStatus>
//!     → every registered subscriber callback
//! ```
//!
//! # Design Decisions
//! - Callbacks run outside the registry lock, so they may subscribe or
//!   unsubscribe freely
//! - A subscription handle holds only a weak reference to the registry

pub mod publisher;

pub use publisher::{StatusMap, StatusPublisher, Subscription};
