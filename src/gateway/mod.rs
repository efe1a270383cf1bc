//! Ingestion gateway.
//!
//! # Data Flow
//! ```text
//! POST /lineage/ingest | /telemetry/ingest
//!     → models.rs validate (namespace length, event count)
//!     → ingest.rs admit (access → auto-create → rate limit → quota)
//!     → per item: structural check → namespace tag → publish (acknowledged)
//!     → counts + "Event {i}: ..." errors
//! ```
//!
//! # Design Decisions
//! - Never blocks on downstream stores; the durable log is the only dependency
//! - Items are independent: a rejected item never aborts its batch
//! - Request-level problems (bounds, access, quota) fail before any item

pub mod error;
pub mod ingest;
pub mod models;

pub use error::GatewayError;
pub use ingest::IngestionGateway;
pub use models::{
    LineageIngestRequest, LineageIngestResponse, TelemetryIngestRequest, TelemetryIngestResponse,
};
