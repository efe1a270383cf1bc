//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HubConfig (validated, immutable)
//!     → shared via Arc / cloned sections to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_str, ConfigError};
pub use validation::{validate_config, ValidationError};
pub use schema::{
    AuthConfig, BatcherConfig, ClickHouseConfig, ForwarderConfig, HealthConfig, HubConfig,
    LogBackend, LogConfig, NamespaceSettings, ObservabilityConfig, QuotaMode, RateLimitConfig,
    ServiceConfig,
};
