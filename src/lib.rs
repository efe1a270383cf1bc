//! Data Lineage Hub
//!
//! Multi-tenant ingestion of OpenLineage events and OpenTelemetry spans and
//! metrics, decoupled from downstream stores by a durable log.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /lineage/ingest ─┐
//!     POST /telemetry/ingest┼─▶ http ──▶ gateway ──▶ log (publisher) ──▶ durable log
//!     /namespaces ──────────┘     │         │                              │
//!                                 │     namespace registry                 │
//!                                 │     + rate limit + quota               │
//!                                 ▼                                        ▼
//!                               health                      ┌──────── consumers ────────┐
//!                                                           │ lineage forwarder         │──▶ lineage service
//!                                                           │ telemetry batcher         │──▶ ClickHouse
//!                                                           └───────────────────────────┘
//!
//!     Cross-cutting: config, observability, lifecycle, resilience, security
//! ```

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod log;
pub mod model;
pub mod namespace;

// Downstream delivery
pub mod consumers;
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::HubConfig;
pub use http::HttpServer;
pub use lifecycle::{Role, Shutdown};
