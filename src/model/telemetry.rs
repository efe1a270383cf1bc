//! OpenTelemetry spans and metrics, normalised for the columnar store.
//!
//! Attribute maps are always `string -> string`: the store's map columns need
//! a single value type, so numbers and booleans are rendered as text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a telemetry payload could not be normalised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("'{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> RecordError {
    RecordError::InvalidField {
        field,
        reason: reason.into(),
    }
}

/// A timestamped event recorded on a span (a Jaeger-style `log`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
    pub timestamp_us: i64,
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

/// One row of the `traces` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanRecord {
    pub received_at: DateTime<Utc>,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub operation_name: String,
    pub service_name: String,
    pub duration_ns: u64,
    pub status_code: String,
    pub span_kind: String,
    pub namespace: String,
    pub attributes: BTreeMap<String, String>,
    pub resource_attributes: BTreeMap<String, String>,
    pub events: Vec<SpanEvent>,
}

impl SpanRecord {
    pub fn from_json(value: &Value, namespace: &str) -> Result<Self, RecordError> {
        let span = value.as_object().ok_or(RecordError::NotAnObject)?;

        let status_code = match span.get("status") {
            Some(Value::Object(status)) => status.get("code").map(coerce_string),
            _ => None,
        };

        let resource_attributes = match nested(span, "process", "tags") {
            Some(tags) => string_map(Some(tags), "process.tags")?,
            None => string_map(nested(span, "resource", "attributes"), "resource.attributes")?,
        };

        let events = match span.get("logs") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(logs)) => logs.iter().map(span_event).collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("logs", "must be an array")),
        };

        Ok(Self {
            received_at: Utc::now(),
            trace_id: text(span, "traceId", ""),
            span_id: text(span, "spanId", ""),
            parent_span_id: text(span, "parentSpanId", ""),
            operation_name: text(span, "operationName", ""),
            service_name: text(span, "serviceName", "unknown"),
            duration_ns: duration(span.get("duration"))?,
            status_code: status_code.unwrap_or_else(|| "OK".to_string()),
            span_kind: text(span, "kind", "INTERNAL"),
            namespace: namespace.to_string(),
            attributes: string_map(span.get("tags"), "tags")?,
            resource_attributes,
            events,
        })
    }
}

/// One row of the `metrics` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub received_at: DateTime<Utc>,
    pub metric_name: String,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub service_name: String,
    pub namespace: String,
    pub attributes: BTreeMap<String, String>,
    pub resource_attributes: BTreeMap<String, String>,
}

impl MetricRecord {
    pub fn from_json(value: &Value, namespace: &str) -> Result<Self, RecordError> {
        let metric = value.as_object().ok_or(RecordError::NotAnObject)?;

        let numeric = match metric.get("value") {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("value", format!("is not numeric: {s:?}")))?,
            Some(other) => return Err(invalid("value", format!("is not numeric: {other}"))),
        };

        Ok(Self {
            received_at: Utc::now(),
            metric_name: text(metric, "name", "unknown"),
            metric_type: text(metric, "type", "gauge"),
            value: numeric,
            unit: text(metric, "unit", ""),
            service_name: text(metric, "serviceName", "unknown"),
            namespace: namespace.to_string(),
            attributes: string_map(metric.get("tags"), "tags")?,
            resource_attributes: string_map(
                nested(metric, "resource", "attributes"),
                "resource.attributes",
            )?,
        })
    }
}

/// Tag a span or metric payload with `resource.attributes["service.namespace"]`
/// unless it already carries one. Missing `resource`/`attributes` objects are
/// created.
pub fn attach_service_namespace(item: &mut Value, namespace: &str) -> Result<(), RecordError> {
    let item = item.as_object_mut().ok_or(RecordError::NotAnObject)?;

    let resource = item
        .entry("resource")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid("resource", "must be an object"))?;

    let attributes = resource
        .entry("attributes")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid("resource.attributes", "must be an object"))?;

    attributes
        .entry("service.namespace")
        .or_insert_with(|| Value::String(namespace.to_string()));
    Ok(())
}

/// Render a JSON value as map text: strings verbatim, null as empty, and
/// everything else as its JSON form.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text(object: &Map<String, Value>, key: &str, default: &str) -> String {
    match object.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => coerce_string(value),
    }
}

fn nested<'a>(object: &'a Map<String, Value>, outer: &str, inner: &str) -> Option<&'a Value> {
    object.get(outer)?.as_object()?.get(inner)
}

fn string_map(
    value: Option<&Value>,
    field: &'static str,
) -> Result<BTreeMap<String, String>, RecordError> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), coerce_string(v)))
            .collect()),
        Some(_) => Err(invalid(field, "must be an object")),
    }
}

fn duration(value: Option<&Value>) -> Result<u64, RecordError> {
    let nanos = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => return Ok(v),
            (None, Some(f)) => f,
            (None, None) => 0.0,
        },
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("duration", format!("is not numeric: {s:?}")))?,
        Some(other) => return Err(invalid("duration", format!("is not numeric: {other}"))),
    };
    Ok(if nanos.is_finite() && nanos > 0.0 { nanos as u64 } else { 0 })
}

fn span_event(log: &Value) -> Result<SpanEvent, RecordError> {
    let log = log.as_object().ok_or_else(|| invalid("logs", "entries must be objects"))?;

    let timestamp_us = match log.get("timestamp") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    };
    let fields = string_map(log.get("fields"), "logs.fields")?;
    let name = fields.get("event").cloned().unwrap_or_else(|| "log".to_string());

    Ok(SpanEvent {
        timestamp_us,
        name,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_span_defaults() {
        let span = SpanRecord::from_json(&json!({}), "team-x").unwrap();
        assert_eq!(span.service_name, "unknown");
        assert_eq!(span.status_code, "OK");
        assert_eq!(span.span_kind, "INTERNAL");
        assert_eq!(span.duration_ns, 0);
        assert_eq!(span.namespace, "team-x");
        assert!(span.events.is_empty());
    }

    #[test]
    fn test_span_normalisation() {
        let span = SpanRecord::from_json(
            &json!({
                "traceId": "t1",
                "spanId": "s1",
                "parentSpanId": "p1",
                "operationName": "GET /orders",
                "serviceName": "orders",
                "duration": 1500,
                "status": {"code": "ERROR"},
                "kind": "SERVER",
                "tags": {"http.status": 500, "retry": true, "route": "/orders", "missing": null},
                "process": {"tags": {"host": "a"}},
                "logs": [
                    {"timestamp": 1700000000000000i64, "fields": {"event": "exception", "attempt": 2}},
                    {"timestamp": 1700000000000001i64}
                ]
            }),
            "team-x",
        )
        .unwrap();

        assert_eq!(span.trace_id, "t1");
        assert_eq!(span.duration_ns, 1500);
        assert_eq!(span.status_code, "ERROR");
        assert_eq!(span.attributes["http.status"], "500");
        assert_eq!(span.attributes["retry"], "true");
        assert_eq!(span.attributes["route"], "/orders");
        assert_eq!(span.attributes["missing"], "");
        assert_eq!(span.resource_attributes["host"], "a");
        assert_eq!(span.events.len(), 2);
        assert_eq!(span.events[0].name, "exception");
        assert_eq!(span.events[0].fields["attempt"], "2");
        assert_eq!(span.events[1].name, "log");
    }

    #[test]
    fn test_span_negative_duration_clamped() {
        let span = SpanRecord::from_json(&json!({"duration": -40}), "n").unwrap();
        assert_eq!(span.duration_ns, 0);
    }

    #[test]
    fn test_span_resource_attribute_fallback() {
        let span = SpanRecord::from_json(
            &json!({"resource": {"attributes": {"service.namespace": "team-x"}}}),
            "team-x",
        )
        .unwrap();
        assert_eq!(span.resource_attributes["service.namespace"], "team-x");
    }

    #[test]
    fn test_span_rejects_bad_shapes() {
        assert_eq!(
            SpanRecord::from_json(&json!([1]), "n").unwrap_err(),
            RecordError::NotAnObject
        );
        assert!(SpanRecord::from_json(&json!({"tags": "a=b"}), "n").is_err());
        assert!(SpanRecord::from_json(&json!({"duration": "soon"}), "n").is_err());
    }

    #[test]
    fn test_metric_normalisation() {
        let metric = MetricRecord::from_json(
            &json!({
                "name": "queue.depth",
                "type": "counter",
                "value": "42.5",
                "unit": "items",
                "tags": {"queue": "orders", "shard": 3},
                "resource": {"attributes": {"service.name": "orders"}}
            }),
            "team-x",
        )
        .unwrap();

        assert_eq!(metric.metric_name, "queue.depth");
        assert_eq!(metric.metric_type, "counter");
        assert_eq!(metric.value, 42.5);
        assert_eq!(metric.attributes["shard"], "3");
        assert_eq!(metric.resource_attributes["service.name"], "orders");
    }

    #[test]
    fn test_metric_defaults_and_errors() {
        let metric = MetricRecord::from_json(&json!({}), "n").unwrap();
        assert_eq!(metric.metric_name, "unknown");
        assert_eq!(metric.metric_type, "gauge");
        assert_eq!(metric.value, 0.0);
        assert_eq!(metric.unit, "");
        assert_eq!(metric.service_name, "unknown");

        assert!(MetricRecord::from_json(&json!({"value": "high"}), "n").is_err());
    }

    #[test]
    fn test_attach_service_namespace() {
        let mut bare = json!({"traceId": "t1"});
        attach_service_namespace(&mut bare, "team-x").unwrap();
        assert_eq!(bare["resource"]["attributes"]["service.namespace"], "team-x");

        let mut tagged = json!({"resource": {"attributes": {"service.namespace": "other"}}});
        attach_service_namespace(&mut tagged, "team-x").unwrap();
        assert_eq!(tagged["resource"]["attributes"]["service.namespace"], "other");

        let mut broken = json!({"resource": "host-a"});
        assert!(attach_service_namespace(&mut broken, "team-x").is_err());
        assert!(attach_service_namespace(&mut json!(3), "team-x").is_err());
    }
}
