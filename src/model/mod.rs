//! Event shapes carried through the hub.
//!
//! Producers send loosely structured JSON. The gateway only performs
//! structural checks ([`lineage::LineageEvent`]); the telemetry batcher turns
//! payloads into canonical typed rows ([`telemetry::SpanRecord`],
//! [`telemetry::MetricRecord`]) exactly once, on the consumer side.

pub mod lineage;
pub mod telemetry;

use serde::{Deserialize, Serialize};

pub use lineage::{LineageEvent, LineageEventType, StructureError};
pub use telemetry::{
    attach_service_namespace, MetricRecord, RecordError, SpanEvent, SpanRecord,
};

/// The three streams that flow through the durable log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "openlineage")]
    OpenLineage,
    #[serde(rename = "otel_span")]
    OtelSpan,
    #[serde(rename = "otel_metric")]
    OtelMetric,
}

impl EventKind {
    /// Value of the `event_type` log header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenLineage => "openlineage",
            Self::OtelSpan => "otel_span",
            Self::OtelMetric => "otel_metric",
        }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "openlineage" => Some(Self::OpenLineage),
            "otel_span" => Some(Self::OtelSpan),
            "otel_metric" => Some(Self::OtelMetric),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
