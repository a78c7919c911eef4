//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → OrchestratorConfig (validated, immutable)
//!     → handed to lifecycle::startup to build adapters
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → runtime swaps in the new fallback section
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the fallback section hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets come from environment variables named in the config

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, CloudFunctionConfig, FallbackConfig, HealthCheckConfig,
    LocalBridgeConfig, ObservabilityConfig, OrchestratorConfig, PrimaryConfig, QualityConfig,
    SpecialistConfig, StatusConfig,
};
