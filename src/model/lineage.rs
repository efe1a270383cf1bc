//! OpenLineage run events.
//!
//! The hub does not own the OpenLineage schema. An event is kept as its raw
//! JSON object and only the handful of fields the hub routes on are checked.

use serde_json::{Map, Value};
use thiserror::Error;

/// Structural problems that reject a single lineage event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("event must be a JSON object")]
    NotAnObject,

    #[error("'{0}' must be an object")]
    NotAnObjectField(&'static str),

    #[error("'{0}' must be a string")]
    NotAStringField(&'static str),
}

/// Run state transitions. Unknown values pass through as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageEventType {
    Start,
    Running,
    Complete,
    Abort,
    Fail,
    Other,
}

impl LineageEventType {
    pub fn parse(value: &str) -> Self {
        match value {
            "START" => Self::Start,
            "RUNNING" => Self::Running,
            "COMPLETE" => Self::Complete,
            "ABORT" => Self::Abort,
            "FAIL" => Self::Fail,
            _ => Self::Other,
        }
    }
}

/// A structurally checked lineage event.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageEvent {
    body: Map<String, Value>,
}

impl LineageEvent {
    /// Accept `value` if it passes the structural presence checks.
    ///
    /// Missing `eventType`, `eventTime` and `producer` are tolerated.
    pub fn from_value(value: Value) -> Result<Self, StructureError> {
        let Value::Object(body) = value else {
            return Err(StructureError::NotAnObject);
        };

        if let Some(job) = body.get("job") {
            if !job.is_object() {
                return Err(StructureError::NotAnObjectField("job"));
            }
        }
        if let Some(run) = body.get("run") {
            let Some(run) = run.as_object() else {
                return Err(StructureError::NotAnObjectField("run"));
            };
            if let Some(run_id) = run.get("runId") {
                if !run_id.is_string() {
                    return Err(StructureError::NotAStringField("run.runId"));
                }
            }
        }
        if let Some(event_type) = body.get("eventType") {
            if !event_type.is_string() {
                return Err(StructureError::NotAStringField("eventType"));
            }
        }

        Ok(Self { body })
    }

    pub fn event_type(&self) -> Option<LineageEventType> {
        self.body
            .get("eventType")
            .and_then(Value::as_str)
            .map(LineageEventType::parse)
    }

    pub fn run_id(&self) -> Option<&str> {
        self.body.get("run")?.get("runId")?.as_str()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.body.get("job")?.get("name")?.as_str()
    }

    pub fn job_namespace(&self) -> Option<&str> {
        self.body.get("job")?.get("namespace")?.as_str()
    }

    /// Set `job.namespace` unless the producer already did, creating `job`
    /// when missing. Returns whether the event was modified.
    pub fn inject_namespace(&mut self, namespace: &str) -> bool {
        let job = self
            .body
            .entry("job")
            .or_insert_with(|| Value::Object(Map::new()));

        match job.as_object_mut() {
            Some(job) if !job.contains_key("namespace") => {
                job.insert("namespace".to_string(), Value::String(namespace.to_string()));
                true
            }
            _ => false,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}
