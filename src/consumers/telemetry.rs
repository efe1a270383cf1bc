//! Telemetry batcher: spans and metrics from the durable log into the
//! columnar store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::BatcherConfig;
use crate::consumers::batch::Batch;
use crate::consumers::store::ColumnarStore;
use crate::log::{namespace_from_key, ConsumedMessage, LogConsumer, LogError, Topics, NAMESPACE_HEADER};
use crate::model::{MetricRecord, SpanRecord};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Namespace for messages that carry neither a header nor a prefixed key.
pub const FALLBACK_NAMESPACE: &str = "internal";

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Flushed(usize),
    /// The snapshot could not be written and was dropped.
    Failed(usize),
}

struct Batches {
    spans: Batch<SpanRecord>,
    metrics: Batch<MetricRecord>,
}

pub struct TelemetryBatcher {
    batches: Mutex<Batches>,
    flush_lock: tokio::sync::Mutex<()>,
    store: Arc<dyn ColumnarStore>,
    spans_topic: String,
    metrics_topic: String,
    batch_size: usize,
    batch_timeout: Duration,
    flush_interval: Duration,
    shutdown_timeout: Duration,
    shutting_down: AtomicBool,
    /// Rows taken out of a batch whose insert has not completed.
    spans_in_flight: AtomicUsize,
    metrics_in_flight: AtomicUsize,
}

/// Namespace of a consumed message: the `namespace` header, else the prefix
/// of a `namespace:id` key, else [`FALLBACK_NAMESPACE`].
pub fn resolve_namespace(message: &ConsumedMessage) -> &str {
    message
        .header(NAMESPACE_HEADER)
        .or_else(|| message.key.as_deref().and_then(namespace_from_key))
        .unwrap_or(FALLBACK_NAMESPACE)
}

impl TelemetryBatcher {
    pub fn new(config: &BatcherConfig, topics: &Topics, store: Arc<dyn ColumnarStore>) -> Self {
        let now = Instant::now();
        Self {
            batches: Mutex::new(Batches {
                spans: Batch::new(now),
                metrics: Batch::new(now),
            }),
            flush_lock: tokio::sync::Mutex::new(()),
            store,
            spans_topic: topics.spans.clone(),
            metrics_topic: topics.metrics.clone(),
            batch_size: config.batch_size,
            batch_timeout: config.batch_timeout(),
            flush_interval: config.flush_interval(),
            shutdown_timeout: config.shutdown_timeout(),
            shutting_down: AtomicBool::new(false),
            spans_in_flight: AtomicUsize::new(0),
            metrics_in_flight: AtomicUsize::new(0),
        }
    }

    fn batches(&self) -> MutexGuard<'_, Batches> {
        self.batches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn pending(&self) -> (usize, usize) {
        let batches = self.batches();
        (batches.spans.len(), batches.metrics.len())
    }

    /// Rows of each kind handed to the store and not yet confirmed.
    pub fn in_flight(&self) -> (usize, usize) {
        (
            self.spans_in_flight.load(Ordering::Acquire),
            self.metrics_in_flight.load(Ordering::Acquire),
        )
    }

    /// Buffer one message, then flush whichever batch is due.
    pub async fn handle(&self, message: &ConsumedMessage) {
        if self.shutting_down.load(Ordering::Acquire) {
            tracing::debug!(
                topic = %message.topic,
                offset = message.offset,
                "Batcher shutting down, message ignored"
            );
            return;
        }

        let payload: Value = match serde_json::from_slice(&message.value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to decode telemetry message"
                );
                return;
            }
        };
        let namespace = resolve_namespace(message);

        if message.topic == self.spans_topic {
            self.buffer_span(&payload, namespace, message);
        } else if message.topic == self.metrics_topic {
            self.buffer_metric(&payload, namespace, message);
        } else {
            tracing::warn!(topic = %message.topic, "Unknown telemetry topic");
            return;
        }

        let (spans_due, metrics_due) = {
            let now = Instant::now();
            let batches = self.batches();
            (
                batches.spans.should_flush(self.batch_size, self.batch_timeout, now),
                batches.metrics.should_flush(self.batch_size, self.batch_timeout, now),
            )
        };
        if spans_due {
            self.flush_spans().await;
        }
        if metrics_due {
            self.flush_metrics().await;
        }
    }

    fn buffer_span(&self, payload: &Value, namespace: &str, message: &ConsumedMessage) {
        match SpanRecord::from_json(payload, namespace) {
            Ok(record) => {
                let trace_id = record.trace_id.clone();
                let mut batches = self.batches();
                batches.spans.push(record);
                metrics::set_batch_pending("spans", batches.spans.len());
                tracing::debug!(trace_id = %trace_id, batch_size = batches.spans.len(), "Added span to batch");
            }
            Err(e) => tracing::error!(
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Invalid span"
            ),
        }
    }

    fn buffer_metric(&self, payload: &Value, namespace: &str, message: &ConsumedMessage) {
        match MetricRecord::from_json(payload, namespace) {
            Ok(record) => {
                let name = record.metric_name.clone();
                let mut batches = self.batches();
                batches.metrics.push(record);
                metrics::set_batch_pending("metrics", batches.metrics.len());
                tracing::debug!(metric_name = %name, batch_size = batches.metrics.len(), "Added metric to batch");
            }
            Err(e) => tracing::error!(
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Invalid metric"
            ),
        }
    }

    pub async fn flush_spans(&self) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;

        let snapshot = self.batches().spans.take();
        if snapshot.is_empty() {
            return FlushOutcome::Empty;
        }
        metrics::set_batch_pending("spans", 0);

        self.spans_in_flight.store(snapshot.len(), Ordering::Release);
        let result = self.store.insert_spans(&snapshot).await;
        self.spans_in_flight.store(0, Ordering::Release);

        let outcome = match result {
            Ok(()) => {
                self.batches().spans.mark_flushed(Instant::now());
                tracing::info!(count = snapshot.len(), store = self.store.name(), "Flushed spans");
                FlushOutcome::Flushed(snapshot.len())
            }
            Err(e) => {
                tracing::error!(count = snapshot.len(), error = %e, "Failed to flush spans, batch dropped");
                FlushOutcome::Failed(snapshot.len())
            }
        };
        record_flush("spans", outcome);
        outcome
    }

    pub async fn flush_metrics(&self) -> FlushOutcome {
        let _guard = self.flush_lock.lock().await;

        let snapshot = self.batches().metrics.take();
        if snapshot.is_empty() {
            return FlushOutcome::Empty;
        }
        metrics::set_batch_pending("metrics", 0);

        self.metrics_in_flight.store(snapshot.len(), Ordering::Release);
        let result = self.store.insert_metrics(&snapshot).await;
        self.metrics_in_flight.store(0, Ordering::Release);

        let outcome = match result {
            Ok(()) => {
                self.batches().metrics.mark_flushed(Instant::now());
                tracing::info!(count = snapshot.len(), store = self.store.name(), "Flushed metrics");
                FlushOutcome::Flushed(snapshot.len())
            }
            Err(e) => {
                tracing::error!(count = snapshot.len(), error = %e, "Failed to flush metrics, batch dropped");
                FlushOutcome::Failed(snapshot.len())
            }
        };
        record_flush("metrics", outcome);
        outcome
    }

    /// Time trigger only; called by the flush timer.
    pub async fn flush_stale(&self) {
        let (spans_stale, metrics_stale) = {
            let now = Instant::now();
            let batches = self.batches();
            (
                batches.spans.is_stale(self.batch_timeout, now),
                batches.metrics.is_stale(self.batch_timeout, now),
            )
        };
        if spans_stale {
            tracing::debug!("Time-based flush triggered for spans");
            self.flush_spans().await;
        }
        if metrics_stale {
            tracing::debug!("Time-based flush triggered for metrics");
            self.flush_metrics().await;
        }
    }

    /// Stop accepting, stop the timer, flush both batches, close the store.
    /// Returns the span and metric rows lost to the shutdown timeout.
    pub async fn shutdown(&self, timer: Option<FlushTimer>) -> (usize, usize) {
        self.shutting_down.store(true, Ordering::Release);
        if let Some(timer) = timer {
            timer.stop().await;
        }

        let final_flush = async {
            let spans = self.flush_spans().await;
            let metrics = self.flush_metrics().await;
            (spans, metrics)
        };
        let dropped = match time::timeout(self.shutdown_timeout, final_flush).await {
            Ok((spans, metrics)) => {
                tracing::info!(spans = ?spans, metrics = ?metrics, "Final telemetry flush complete");
                (0, 0)
            }
            Err(_) => {
                let (pending_spans, pending_metrics) = self.pending();
                let (flight_spans, flight_metrics) = self.in_flight();
                let dropped = (pending_spans + flight_spans, pending_metrics + flight_metrics);
                tracing::error!(
                    dropped_spans = dropped.0,
                    dropped_metrics = dropped.1,
                    timeout = ?self.shutdown_timeout,
                    "Final telemetry flush timed out"
                );
                if dropped.0 > 0 {
                    metrics::record_flush("spans", "error", dropped.0);
                }
                if dropped.1 > 0 {
                    metrics::record_flush("metrics", "error", dropped.1);
                }
                dropped
            }
        };

        self.store.close().await;
        dropped
    }

    /// Consume until `shutdown` fires or the log closes, then shut down.
    pub async fn run(
        self: Arc<Self>,
        mut consumer: Box<dyn LogConsumer>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            spans_topic = %self.spans_topic,
            metrics_topic = %self.metrics_topic,
            batch_size = self.batch_size,
            batch_timeout = ?self.batch_timeout,
            "Telemetry batcher starting"
        );

        let timer = FlushTimer::start(self.clone(), self.flush_interval);
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
                        tracing::info!("Telemetry log closed");
                        break;
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::error!(error = %e, attempt = failures, "Telemetry consume failed");
                        time::sleep(calculate_backoff(failures, 100, 5000)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Telemetry batcher received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(Some(timer)).await;
        tracing::info!("Telemetry batcher stopped");
    }
}

fn record_flush(kind: &'static str, outcome: FlushOutcome) {
    match outcome {
        FlushOutcome::Empty => {}
        FlushOutcome::Flushed(rows) => metrics::record_flush(kind, "ok", rows),
        FlushOutcome::Failed(rows) => metrics::record_flush(kind, "error", rows),
    }
}

/// Background task running the time trigger every interval.
pub struct FlushTimer {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushTimer {
    pub fn start(batcher: Arc<TelemetryBatcher>, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => batcher.flush_stale().await,
                    _ = &mut stopped => break,
                }
            }
            tracing::debug!("Flush timer stopped");
        });
        Self { stop, handle }
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Flush timer task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::consumers::store::{MemoryStore, StoreCall, StoreError};
    use crate::log::MemoryLog;
    use serde_json::json;

    fn batcher(store: Arc<MemoryStore>) -> TelemetryBatcher {
        TelemetryBatcher::new(
            &BatcherConfig::default(),
            &Topics::from_config(&LogConfig::default()),
            store,
        )
    }

    fn message(topic: &str, key: Option<&str>, headers: &[(&str, &str)], value: Value) -> ConsumedMessage {
        ConsumedMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: 0,
            key: key.map(str::to_string),
            value: serde_json::to_vec(&value).unwrap(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn span(i: usize) -> ConsumedMessage {
        message(
            "otel-spans",
            Some("team-x:t"),
            &[("namespace", "team-x")],
            json!({"traceId": format!("t{i}"), "spanId": "s"}),
        )
    }

    #[test]
    fn test_namespace_resolution_order() {
        let body = json!({});
        let from_header = message("otel-spans", Some("keyed:id"), &[("namespace", "header-ns")], body.clone());
        assert_eq!(resolve_namespace(&from_header), "header-ns");

        let from_key = message("otel-spans", Some("keyed:id"), &[], body.clone());
        assert_eq!(resolve_namespace(&from_key), "keyed");

        let bare_key = message("otel-spans", Some("no-colon"), &[], body.clone());
        assert_eq!(resolve_namespace(&bare_key), "internal");

        let nothing = message("otel-spans", None, &[], body);
        assert_eq!(resolve_namespace(&nothing), "internal");
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_trigger_flushes_inline() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());

        for i in 0..150 {
            batcher.handle(&span(i)).await;
        }

        assert_eq!(store.calls(), vec![StoreCall::Spans(100)]);
        assert_eq!(batcher.pending(), (50, 0));
        assert_eq!(store.spans()[0].trace_id, "t0");
        assert_eq!(store.spans()[99].namespace, "team-x");
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_trigger_on_next_message() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());

        batcher.handle(&span(0)).await;
        time::advance(Duration::from_secs(29)).await;
        batcher.handle(&span(1)).await;
        assert!(store.calls().is_empty());

        time::advance(Duration::from_secs(1)).await;
        batcher.handle(&span(2)).await;
        assert_eq!(store.calls(), vec![StoreCall::Spans(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_stale_batch() {
        let store = Arc::new(MemoryStore::new());
        let batcher = Arc::new(batcher(store.clone()));

        let timer = FlushTimer::start(batcher.clone(), Duration::from_secs(5));
        for i in 0..50 {
            batcher.handle(&span(i)).await;
        }

        time::sleep(Duration::from_secs(20)).await;
        assert!(store.calls().is_empty());

        time::sleep(Duration::from_secs(16)).await;
        assert_eq!(store.calls(), vec![StoreCall::Spans(50)]);
        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());
        batcher.handle(&span(0)).await;

        assert_eq!(batcher.flush_spans().await, FlushOutcome::Flushed(1));
        assert_eq!(batcher.flush_spans().await, FlushOutcome::Empty);
        assert_eq!(batcher.flush_metrics().await, FlushOutcome::Empty);
        assert_eq!(store.calls(), vec![StoreCall::Spans(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_drops_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());
        batcher.handle(&span(0)).await;
        batcher.handle(&span(1)).await;

        store.set_failing(true);
        assert_eq!(batcher.flush_spans().await, FlushOutcome::Failed(2));
        assert_eq!(batcher.pending(), (0, 0));

        store.set_failing(false);
        assert_eq!(batcher.flush_spans().await, FlushOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_routed_by_topic() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());

        let metric = message(
            "otel-metrics",
            Some("ml-team:svc"),
            &[],
            json!({"name": "latency", "value": "12.5", "tags": {"route": "/a"}}),
        );
        batcher.handle(&metric).await;
        batcher.handle(&message("unknown-topic", None, &[], json!({}))).await;
        batcher.handle(&ConsumedMessage {
            value: b"not json".to_vec(),
            ..span(0)
        })
        .await;

        assert_eq!(batcher.pending(), (0, 1));
        batcher.flush_metrics().await;
        let stored = store.metrics();
        assert_eq!(stored[0].namespace, "ml-team");
        assert_eq!(stored[0].value, 12.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_then_closes() {
        let store = Arc::new(MemoryStore::new());
        let batcher = Arc::new(batcher(store.clone()));
        let timer = FlushTimer::start(batcher.clone(), Duration::from_secs(5));

        for i in 0..40 {
            batcher.handle(&span(i)).await;
        }
        batcher.shutdown(Some(timer)).await;

        assert_eq!(store.calls(), vec![StoreCall::Spans(40), StoreCall::Close]);
        assert!(store.is_closed());

        batcher.handle(&span(41)).await;
        assert_eq!(batcher.pending(), (0, 0));
    }

    /// Accepts inserts but never completes them.
    #[derive(Default)]
    struct StalledStore {
        closed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ColumnarStore for StalledStore {
        async fn insert_spans(&self, _rows: &[SpanRecord]) -> Result<(), StoreError> {
            time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }

        async fn insert_metrics(&self, _rows: &[MetricRecord]) -> Result<(), StoreError> {
            time::sleep(Duration::from_secs(600)).await;
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Release);
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_counts_rows_in_flight() {
        let store = Arc::new(StalledStore::default());
        let config = BatcherConfig {
            shutdown_timeout_secs: 1,
            ..Default::default()
        };
        let batcher = TelemetryBatcher::new(&config, &Topics::from_config(&LogConfig::default()), store.clone());

        for i in 0..40 {
            batcher.handle(&span(i)).await;
        }
        let metric = message("otel-metrics", None, &[], json!({"name": "m"}));
        batcher.handle(&metric).await;
        batcher.handle(&metric).await;

        let started = Instant::now();
        let dropped = batcher.shutdown(None).await;

        assert_eq!(dropped, (40, 2));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(batcher.pending(), (0, 2));
        assert_eq!(batcher.in_flight(), (40, 0));
        assert!(store.closed.load(Ordering::Acquire));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_shutdown_reports_no_drops() {
        let store = Arc::new(MemoryStore::new());
        let batcher = batcher(store.clone());
        batcher.handle(&span(0)).await;

        assert_eq!(batcher.shutdown(None).await, (0, 0));
        assert_eq!(batcher.in_flight(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_consumes_from_log_until_shutdown() {
        let log = MemoryLog::new(2);
        let topics = Topics::from_config(&LogConfig::default());
        let store = Arc::new(MemoryStore::new());
        let batcher = Arc::new(TelemetryBatcher::new(&BatcherConfig::default(), &topics, store.clone()));
        let consumer = log.subscribe("otel-consumer-group", &["otel-spans", "otel-metrics"]);

        let publisher = crate::log::EventPublisher::new(Arc::new(log.clone()), &LogConfig::default());
        for i in 0..3 {
            assert!(publisher.publish_span(&json!({"traceId": format!("t{i}")}), Some("team-x")).await);
        }
        assert!(publisher.publish_metric(&json!({"name": "m"}), None).await);

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(batcher.clone().run(Box::new(consumer), rx));
        time::sleep(Duration::from_millis(10)).await;
        tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(store.spans().len(), 3);
        assert!(store.spans().iter().all(|s| s.namespace == "team-x"));
        assert_eq!(store.metrics()[0].namespace, "internal");
        assert_eq!(store.calls().last(), Some(&StoreCall::Close));
    }
}
