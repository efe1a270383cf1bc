//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → http/auth.rs (bearer key → identity, 401 on protected routes)
//!     → registry access check (403)
//!     → rate_limit.rs (per-namespace token bucket, 429)
//!     → quota check (429)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Limits are per namespace, not per client address

pub mod rate_limit;

pub use rate_limit::NamespaceRateLimiter;
