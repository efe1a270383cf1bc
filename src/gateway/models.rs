//! Ingestion request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gateway::error::GatewayError;

pub const NAMESPACE_MIN_LEN: usize = 3;
pub const NAMESPACE_MAX_LEN: usize = 50;
pub const MAX_EVENTS_PER_REQUEST: usize = 100;

/// Body of `POST /lineage/ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageIngestRequest {
    pub namespace: String,
    pub events: Vec<Value>,
    #[serde(default)]
    pub source: Option<String>,
}

impl LineageIngestRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        check_namespace_length(&self.namespace)?;
        if self.events.is_empty() || self.events.len() > MAX_EVENTS_PER_REQUEST {
            return Err(GatewayError::InvalidRequest(format!(
                "events: expected 1 to {} items, got {}",
                MAX_EVENTS_PER_REQUEST,
                self.events.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageIngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<String>,
    pub namespace: String,
}

/// Body of `POST /telemetry/ingest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryIngestRequest {
    pub namespace: String,
    #[serde(default)]
    pub traces: Vec<Value>,
    #[serde(default)]
    pub metrics: Vec<Value>,
    #[serde(default)]
    pub source: Option<String>,
}

impl TelemetryIngestRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        check_namespace_length(&self.namespace)
    }

    pub fn item_count(&self) -> usize {
        self.traces.len() + self.metrics.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryIngestResponse {
    pub traces_accepted: usize,
    pub traces_rejected: usize,
    pub metrics_accepted: usize,
    pub metrics_rejected: usize,
    pub errors: Vec<String>,
    pub namespace: String,
}

fn check_namespace_length(namespace: &str) -> Result<(), GatewayError> {
    let len = namespace.chars().count();
    if (NAMESPACE_MIN_LEN..=NAMESPACE_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(GatewayError::InvalidRequest(format!(
            "namespace: expected {} to {} characters, got {}",
            NAMESPACE_MIN_LEN, NAMESPACE_MAX_LEN, len
        )))
    }
}
