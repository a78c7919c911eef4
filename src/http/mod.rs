//! Admin and query HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request id, trace, timeout layers)
//!     → handlers.rs
//!         → GET  /health, /status, /circuit-breakers, /best-backend
//!         → POST /query → AssistantRuntime::submit
//! ```

pub mod handlers;
pub mod server;

pub use server::{AdminServer, AppState};
