//! Health reporting.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → checker.rs
//!         → durable log reachability (LogProducer::is_healthy)
//!         → lineage sink (HTTP GET base URL)
//!         → ClickHouse (HTTP GET /ping)
//!     → HealthReport { status, dependencies }
//! ```
//!
//! # Design Decisions
//! - Probes run concurrently, each bounded by the probe timeout
//! - Downstream sinks never make the gateway unhealthy; only the log does
//! - Probing can be switched off, reporting `unknown`

pub mod checker;

pub use checker::{HealthChecker, HealthReport};
