//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout, body limit)
//!     → auth.rs (bearer key → Identity extension, 401 on protected routes)
//!     → handlers.rs (extract, validate, admit)
//!     → gateway (per-item publish) / namespace registry
//!     → error.rs (ApiError → status + {"detail"})
//! ```
//!
//! # Design Decisions
//! - Every route is served at the root and again under `/api/v1`
//! - Body shape errors are rejected before any item is looked at
//! - Handlers stay thin; policy lives in the gateway and registry

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{ApiKeyValidator, Identity};
pub use error::ApiError;
pub use server::{AppState, HttpServer};
