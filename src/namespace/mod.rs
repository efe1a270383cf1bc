//! Namespace (tenant) management.
//!
//! # Data Flow
//! ```text
//! gateway request (namespace, identity, count)
//!     → registry.validate_access()   isolation / existence / membership
//!     → registry.auto_create_if_needed()
//!     → registry.reserve_quota()     batch ceiling (+ daily reservation)
//!     → rejected items → registry.release_quota()
//! ```
//!
//! # Design Decisions
//! - One registry per process, shared via `Arc`; no persistence across restarts
//! - Configs are immutable snapshots (`Arc<NamespaceConfig>`) swapped on update
//! - Access decisions never error: they answer yes or no

pub mod error;
pub mod model;
pub mod quota;
pub mod registry;

pub use error::NamespaceError;
pub use model::{
    is_valid_namespace_name, CreateNamespace, NamespaceConfig, NamespaceUpdate, MAX_DAILY_QUOTA,
    MAX_RETENTION_DAYS, MIN_DAILY_QUOTA, MIN_RETENTION_DAYS,
};
pub use quota::DailyUsage;
pub use registry::NamespaceRegistry;
