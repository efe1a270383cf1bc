//! Client for the lineage hub ingestion API.

pub mod client;
pub mod event;

pub use client::{ClientError, HubClient, LineageIngestResponse, TelemetryIngestResponse};
pub use event::{lineage_event, new_run_id};
