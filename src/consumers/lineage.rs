//! Lineage forwarder: lineage events from the durable log to the
//! lineage-graph service.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::ForwarderConfig;
use crate::consumers::sink::{ForwardError, LineageSink};
use crate::log::{ConsumedMessage, LogConsumer, LogError, NAMESPACE_HEADER};
use crate::model::LineageEvent;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Forwarded,
    Failed,
    /// The message was not a lineage event and was skipped.
    Invalid,
}

pub struct LineageForwarder {
    sink: Arc<dyn LineageSink>,
    default_namespace: String,
    max_retries: u32,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
}

impl LineageForwarder {
    pub fn new(config: &ForwarderConfig, sink: Arc<dyn LineageSink>) -> Self {
        Self {
            sink,
            default_namespace: config.default_namespace.clone(),
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
            retry_max_delay_ms: config.retry_max_delay_ms,
        }
    }

    /// Header first, then `job.namespace`, then the configured default.
    pub fn resolve_namespace<'a>(&'a self, message: &'a ConsumedMessage, event: &'a LineageEvent) -> &'a str {
        message
            .header(NAMESPACE_HEADER)
            .or_else(|| event.job_namespace())
            .unwrap_or(self.default_namespace.as_str())
    }

    pub async fn handle(&self, message: &ConsumedMessage) -> ForwardOutcome {
        let event = match serde_json::from_slice::<Value>(&message.value)
            .map_err(|e| e.to_string())
            .and_then(|value| LineageEvent::from_value(value).map_err(|e| e.to_string()))
        {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Error processing lineage message"
                );
                metrics::record_forward("invalid");
                return ForwardOutcome::Invalid;
            }
        };

        let namespace = self.resolve_namespace(message, &event).to_string();
        let mut event = event;
        event.inject_namespace(&namespace);

        tracing::debug!(
            run_id = ?event.run_id(),
            event_type = ?event.event_type(),
            job_name = ?event.job_name(),
            namespace = %namespace,
            partition = message.partition,
            offset = message.offset,
            "Processing lineage event"
        );

        let body = event.into_value();
        match self.forward(&body, &namespace).await {
            Ok(()) => {
                tracing::info!(
                    run_id = ?body.pointer("/run/runId"),
                    namespace = %namespace,
                    "Forwarded lineage event"
                );
                metrics::record_forward("ok");
                ForwardOutcome::Forwarded
            }
            Err(e) => {
                tracing::error!(
                    run_id = ?body.pointer("/run/runId"),
                    namespace = %namespace,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to forward lineage event"
                );
                metrics::record_forward("error");
                ForwardOutcome::Failed
            }
        }
    }

    async fn forward(&self, event: &Value, namespace: &str) -> Result<(), ForwardError> {
        let mut attempt = 0;
        loop {
            match self.sink.send(event, namespace).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    let delay = calculate_backoff(attempt, self.retry_base_delay_ms, self.retry_max_delay_ms);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Lineage forward failed, retrying"
                    );
                    time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume until `shutdown` fires or the log closes. Every message is
    /// committed after handling, forwarded or not.
    pub async fn run(self, mut consumer: Box<dyn LogConsumer>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            default_namespace = %self.default_namespace,
            max_retries = self.max_retries,
            "Lineage forwarder starting"
        );
        let mut failures = 0u32;

        loop {
            tokio::select! {
                received = consumer.recv() => match received {
                    Ok(message) => {
                        failures = 0;
                        self.handle(&message).await;
                        if let Err(e) = consumer.commit(&message).await {
                            tracing::warn!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                error = %e,
                                "Offset commit failed"
                            );
                        }
                    }
                    Err(LogError::Closed) => {
                        tracing::info!("Lineage log closed");
                        break;
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::error!(error = %e, attempt = failures, "Lineage consume failed");
                        time::sleep(calculate_backoff(failures, 100, 5000)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Lineage forwarder received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!("Lineage forwarder stopped");
    }
}

/// Transport errors and server-side failures are worth another attempt;
/// other statuses mean the sink rejected the event.
fn is_retryable(err: &ForwardError) -> bool {
    match err {
        ForwardError::Http(_) => true,
        ForwardError::Status { status, .. } => *status >= 500,
    }
}
