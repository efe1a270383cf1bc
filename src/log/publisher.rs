//! Typed publishing on top of a [`LogProducer`].
//!
//! Every publish waits for acknowledgment (bounded by the configured timeout)
//! and reports a plain `bool`: callers count outcomes, they never see errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::LogConfig;
use crate::log::keys::{message_headers, message_key};
use crate::log::record::LogMessage;
use crate::log::transport::LogProducer;
use crate::model::{EventKind, LineageEvent};
use crate::observability::metrics;

/// Topic names for the three streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub lineage: String,
    pub spans: String,
    pub metrics: String,
}

impl Topics {
    pub fn from_config(config: &LogConfig) -> Self {
        Self {
            lineage: config.lineage_topic.clone(),
            spans: config.spans_topic.clone(),
            metrics: config.metrics_topic.clone(),
        }
    }

    pub fn for_kind(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::OpenLineage => &self.lineage,
            EventKind::OtelSpan => &self.spans,
            EventKind::OtelMetric => &self.metrics,
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    producer: Arc<dyn LogProducer>,
    topics: Topics,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(producer: Arc<dyn LogProducer>, config: &LogConfig) -> Self {
        Self {
            producer,
            topics: Topics::from_config(config),
            timeout: config.publish_timeout(),
        }
    }

    pub fn producer(&self) -> &Arc<dyn LogProducer> {
        &self.producer
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Encode `value` and append it, waiting for the acknowledgment.
    pub async fn publish(
        &self,
        topic: &str,
        key: Option<String>,
        value: &Value,
        headers: Vec<(String, String)>,
    ) -> bool {
        let payload = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to encode message");
                return false;
            }
        };

        let message = LogMessage {
            topic: topic.to_string(),
            key: key.clone(),
            value: payload,
            headers,
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.producer.send(message, self.timeout)).await;
        let success = match outcome {
            Ok(Ok(delivery)) => {
                tracing::debug!(
                    topic = %topic,
                    key = ?key,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "Message delivered"
                );
                true
            }
            Ok(Err(e)) => {
                tracing::error!(topic = %topic, key = ?key, error = %e, "Message delivery failed");
                false
            }
            Err(_) => {
                tracing::error!(
                    topic = %topic,
                    key = ?key,
                    timeout = ?self.timeout,
                    "Message delivery timed out"
                );
                false
            }
        };

        metrics::record_publish(topic, success, started);
        success
    }

    /// Publish a lineage event keyed by `namespace:run_id`.
    pub async fn publish_lineage(&self, event: &LineageEvent, namespace: Option<&str>) -> bool {
        let key = message_key(namespace, event.run_id());
        let headers = message_headers(namespace, EventKind::OpenLineage);
        let value = Value::Object(event.as_map().clone());
        self.publish(&self.topics.lineage, key, &value, headers).await
    }

    /// Publish a span payload keyed by `namespace:traceId`.
    pub async fn publish_span(&self, span: &Value, namespace: Option<&str>) -> bool {
        let trace_id = span.get("traceId").and_then(Value::as_str);
        let key = message_key(namespace, trace_id);
        let headers = message_headers(namespace, EventKind::OtelSpan);
        self.publish(&self.topics.spans, key, span, headers).await
    }

    /// Publish a metric payload keyed by `namespace:service.name`.
    pub async fn publish_metric(&self, metric: &Value, namespace: Option<&str>) -> bool {
        let service_name = metric
            .get("resource")
            .and_then(|r| r.get("attributes"))
            .and_then(|a| a.get("service.name"))
            .and_then(Value::as_str);
        let key = message_key(namespace, service_name);
        let headers = message_headers(namespace, EventKind::OtelMetric);
        self.publish(&self.topics.metrics, key, metric, headers).await
    }

    pub async fn flush(&self) {
        if let Err(e) = self.producer.flush(self.timeout).await {
            tracing::warn!(error = %e, "Log producer flush incomplete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::memory::MemoryLog;
    use serde_json::json;

    fn publisher() -> (MemoryLog, EventPublisher) {
        let log = MemoryLog::new(4);
        let publisher = EventPublisher::new(Arc::new(log.clone()), &LogConfig::default());
        (log, publisher)
    }

    #[tokio::test]
    async fn test_lineage_key_and_headers() {
        let (log, publisher) = publisher();
        let with_run = LineageEvent::from_value(json!({"run": {"runId": "r"}})).unwrap();
        let without_run = LineageEvent::from_value(json!({"eventType": "START"})).unwrap();

        assert!(publisher.publish_lineage(&with_run, Some("n")).await);
        assert!(publisher.publish_lineage(&without_run, Some("n")).await);

        let mut keys: Vec<_> = log
            .messages("openlineage-events")
            .into_iter()
            .map(|m| {
                assert_eq!(m.header("namespace"), Some("n"));
                assert_eq!(m.header("event_type"), Some("openlineage"));
                m.key.unwrap()
            })
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["n", "n:r"]);
    }

    #[tokio::test]
    async fn test_span_and_metric_keys() {
        let (log, publisher) = publisher();
        assert!(publisher.publish_span(&json!({"traceId": "t1"}), Some("team-x")).await);
        assert!(
            publisher
                .publish_metric(
                    &json!({"resource": {"attributes": {"service.name": "orders"}}}),
                    None
                )
                .await
        );

        let span = log.messages("otel-spans").remove(0);
        assert_eq!(span.key.as_deref(), Some("team-x:t1"));
        assert_eq!(span.header("event_type"), Some("otel_span"));

        let metric = log.messages("otel-metrics").remove(0);
        assert_eq!(metric.key.as_deref(), Some("orders"));
        assert!(metric.headers.is_empty());
    }

    #[tokio::test]
    async fn test_publish_reports_failure_instead_of_erroring() {
        let (log, publisher) = publisher();
        log.set_available(false);
        assert!(!publisher.publish_span(&json!({}), Some("team-x")).await);
        assert!(log.messages("otel-spans").is_empty());
    }
}
