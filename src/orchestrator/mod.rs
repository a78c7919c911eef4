//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! submit(request)
//!     → fallback.rs: walk chain, skip open/unavailable adapters
//!     → adapter.query()
//!     → first success ─────────────────→ AiResponse
//!     → every entry skipped or failed → offline.rs → AiResponse (backend_used = offline)
//! ```

pub mod fallback;
pub mod offline;
pub mod types;

pub use fallback::{DispatchError, FallbackOrchestrator};
pub use offline::{advisory_text, offline_response, OFFLINE_CONFIDENCE};
pub use types::{AiRequest, AiResponse, RequestKind};
