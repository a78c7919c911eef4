//! Multi-backend AI request orchestrator.
//!
//! Requests are dispatched down an ordered chain of backend adapters, each
//! guarded by its own circuit breaker and health monitor. When every backend
//! is exhausted the caller still gets a well-formed, low-confidence offline
//! response.

// Core subsystems
pub mod backends;
pub mod config;
pub mod orchestrator;
pub mod status;

// Failure handling
pub mod health;
pub mod resilience;

// Cross-cutting concerns
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use backends::{BackendAdapter, BackendError, BackendId, HealthStatus};
pub use config::OrchestratorConfig;
pub use http::AdminServer;
pub use lifecycle::{AssistantRuntime, Shutdown};
pub use orchestrator::{AiRequest, AiResponse, RequestKind};
