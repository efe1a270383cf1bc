//! Ingestion gateway: admission checks and per-item publishing.

use std::sync::Arc;

use serde_json::Value;

use crate::gateway::error::GatewayError;
use crate::gateway::models::{LineageIngestResponse, TelemetryIngestResponse};
use crate::log::EventPublisher;
use crate::model::{attach_service_namespace, LineageEvent};
use crate::namespace::NamespaceRegistry;
use crate::observability::metrics;
use crate::security::NamespaceRateLimiter;

const PUBLISH_FAILED: &str = "Failed to publish to durable log";

pub struct IngestionGateway {
    registry: Arc<NamespaceRegistry>,
    publisher: EventPublisher,
    limiter: NamespaceRateLimiter,
}

impl IngestionGateway {
    pub fn new(
        registry: Arc<NamespaceRegistry>,
        publisher: EventPublisher,
        limiter: NamespaceRateLimiter,
    ) -> Self {
        Self {
            registry,
            publisher,
            limiter,
        }
    }

    pub fn registry(&self) -> &Arc<NamespaceRegistry> {
        &self.registry
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Access check for `namespace`. A missing namespace passes when
    /// auto-creation is on; [`Self::admit`] then creates it.
    pub fn authorize(
        &self,
        namespace: &str,
        identity: Option<&str>,
        require_owner: bool,
    ) -> Result<(), GatewayError> {
        if self.registry.validate_access(namespace, identity, require_owner) {
            tracing::debug!(namespace = %namespace, identity = ?identity, require_owner, "Namespace access granted");
            return Ok(());
        }

        tracing::warn!(
            namespace = %namespace,
            identity = ?identity,
            require_owner,
            "Namespace access denied"
        );
        Err(GatewayError::AccessDenied(namespace.to_string()))
    }

    /// Everything a batch must pass before any item is processed: access,
    /// existence (auto-creating when allowed), rate limit, then quota. In
    /// daily quota mode the batch size is reserved here and the ingest call
    /// refunds whatever it rejects.
    pub fn admit(
        &self,
        namespace: &str,
        identity: Option<&str>,
        item_count: usize,
    ) -> Result<(), GatewayError> {
        self.authorize(namespace, identity, false)?;

        if !self.registry.auto_create_if_needed(namespace) {
            tracing::warn!(namespace = %namespace, "Unknown namespace and auto-create disabled");
            return Err(GatewayError::AccessDenied(namespace.to_string()));
        }

        if !self.limiter.check(namespace) {
            return Err(GatewayError::RateLimited(namespace.to_string()));
        }

        let requested = item_count as u64;
        if !self.registry.reserve_quota(namespace, requested) {
            tracing::warn!(namespace = %namespace, requested, "Event quota exceeded");
            return Err(GatewayError::QuotaExceeded {
                namespace: namespace.to_string(),
                requested,
            });
        }
        Ok(())
    }

    /// Check, tag and publish each event on its own. One bad event never
    /// affects the rest of the batch.
    pub async fn ingest_lineage(
        &self,
        namespace: &str,
        events: Vec<Value>,
        source: Option<&str>,
    ) -> LineageIngestResponse {
        tracing::info!(
            namespace = %namespace,
            event_count = events.len(),
            source = ?source,
            "Received lineage ingestion request"
        );

        let mut accepted = 0;
        let mut errors = Vec::new();

        for (i, raw) in events.into_iter().enumerate() {
            let mut event = match LineageEvent::from_value(raw) {
                Ok(event) => event,
                Err(e) => {
                    errors.push(format!("Event {}: {}", i, e));
                    continue;
                }
            };
            event.inject_namespace(namespace);

            if self.publisher.publish_lineage(&event, Some(namespace)).await {
                accepted += 1;
            } else {
                errors.push(format!("Event {}: {}", i, PUBLISH_FAILED));
            }
        }

        let rejected = errors.len();
        self.registry.release_quota(namespace, rejected as u64);
        metrics::record_ingest("lineage", "accepted", accepted as u64);
        metrics::record_ingest("lineage", "rejected", rejected as u64);

        tracing::info!(
            namespace = %namespace,
            accepted,
            rejected,
            "Completed lineage ingestion"
        );

        LineageIngestResponse {
            accepted,
            rejected,
            errors,
            namespace: namespace.to_string(),
        }
    }

    /// Publish traces and metrics as two independent sub-batches.
    pub async fn ingest_telemetry(
        &self,
        namespace: &str,
        traces: Vec<Value>,
        metrics_batch: Vec<Value>,
        source: Option<&str>,
    ) -> TelemetryIngestResponse {
        tracing::info!(
            namespace = %namespace,
            traces_count = traces.len(),
            metrics_count = metrics_batch.len(),
            source = ?source,
            "Received telemetry ingestion request"
        );

        let mut errors = Vec::new();

        let mut traces_accepted = 0;
        let mut traces_rejected = 0;
        for (i, mut trace) in traces.into_iter().enumerate() {
            if let Err(e) = attach_service_namespace(&mut trace, namespace) {
                traces_rejected += 1;
                errors.push(format!("Trace {}: {}", i, e));
                continue;
            }
            if self.publisher.publish_span(&trace, Some(namespace)).await {
                traces_accepted += 1;
            } else {
                traces_rejected += 1;
                errors.push(format!("Trace {}: {}", i, PUBLISH_FAILED));
            }
        }

        let mut metrics_accepted = 0;
        let mut metrics_rejected = 0;
        for (i, mut metric) in metrics_batch.into_iter().enumerate() {
            if let Err(e) = attach_service_namespace(&mut metric, namespace) {
                metrics_rejected += 1;
                errors.push(format!("Metric {}: {}", i, e));
                continue;
            }
            if self.publisher.publish_metric(&metric, Some(namespace)).await {
                metrics_accepted += 1;
            } else {
                metrics_rejected += 1;
                errors.push(format!("Metric {}: {}", i, PUBLISH_FAILED));
            }
        }

        self.registry
            .release_quota(namespace, (traces_rejected + metrics_rejected) as u64);
        metrics::record_ingest("spans", "accepted", traces_accepted as u64);
        metrics::record_ingest("spans", "rejected", traces_rejected as u64);
        metrics::record_ingest("metrics", "accepted", metrics_accepted as u64);
        metrics::record_ingest("metrics", "rejected", metrics_rejected as u64);

        tracing::info!(
            namespace = %namespace,
            traces_accepted,
            traces_rejected,
            metrics_accepted,
            metrics_rejected,
            "Completed telemetry ingestion"
        );

        TelemetryIngestResponse {
            traces_accepted,
            traces_rejected,
            metrics_accepted,
            metrics_rejected,
            errors,
            namespace: namespace.to_string(),
        }
    }
}
