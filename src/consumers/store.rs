//! Columnar store seam and its ClickHouse and in-memory implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use clickhouse::{insert::Insert, Client, Row};
use serde::Serialize;
use thiserror::Error;
use tokio::time;

use crate::config::ClickHouseConfig;
use crate::model::{MetricRecord, SpanRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store is closed")]
    Closed,
}

/// Bulk sink for normalised telemetry.
#[async_trait]
pub trait ColumnarStore: Send + Sync + 'static {
    async fn insert_spans(&self, rows: &[SpanRecord]) -> Result<(), StoreError>;

    async fn insert_metrics(&self, rows: &[MetricRecord]) -> Result<(), StoreError>;

    /// Release connections. Inserts after close fail with [`StoreError::Closed`].
    async fn close(&self);

    fn name(&self) -> &'static str;
}

/// Row of the `traces` table.
///
/// ```sql
/// CREATE TABLE otel.traces (
///     timestamp DateTime64(3),
///     trace_id String,
///     span_id String,
///     parent_span_id String,
///     operation_name LowCardinality(String),
///     service_name LowCardinality(String),
///     duration_ns UInt64,
///     status_code LowCardinality(String),
///     span_kind LowCardinality(String),
///     namespace LowCardinality(String),
///     attributes Map(String, String),
///     resource_attributes Map(String, String),
///     events String
/// ) ENGINE = MergeTree()
/// PARTITION BY toYYYYMMDD(timestamp)
/// ORDER BY (namespace, service_name, timestamp);
/// ```
#[derive(Debug, Clone, Row, Serialize)]
pub struct SpanRow {
    /// Receive time in milliseconds
    pub timestamp: i64,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub operation_name: String,
    pub service_name: String,
    pub duration_ns: u64,
    pub status_code: String,
    pub span_kind: String,
    pub namespace: String,
    pub attributes: Vec<(String, String)>,
    pub resource_attributes: Vec<(String, String)>,
    /// Span events as a JSON array
    pub events: String,
}

impl SpanRow {
    pub fn from_record(record: &SpanRecord) -> Result<Self, StoreError> {
        Ok(Self {
            timestamp: record.received_at.timestamp_millis(),
            trace_id: record.trace_id.clone(),
            span_id: record.span_id.clone(),
            parent_span_id: record.parent_span_id.clone(),
            operation_name: record.operation_name.clone(),
            service_name: record.service_name.clone(),
            duration_ns: record.duration_ns,
            status_code: record.status_code.clone(),
            span_kind: record.span_kind.clone(),
            namespace: record.namespace.clone(),
            attributes: map_column(&record.attributes),
            resource_attributes: map_column(&record.resource_attributes),
            events: serde_json::to_string(&record.events)?,
        })
    }
}

/// Row of the `metrics` table.
#[derive(Debug, Clone, Row, Serialize)]
pub struct MetricRow {
    /// Receive time in milliseconds
    pub timestamp: i64,
    pub metric_name: String,
    pub metric_type: String,
    pub value: f64,
    pub unit: String,
    pub service_name: String,
    pub namespace: String,
    pub attributes: Vec<(String, String)>,
    pub resource_attributes: Vec<(String, String)>,
}

impl From<&MetricRecord> for MetricRow {
    fn from(record: &MetricRecord) -> Self {
        Self {
            timestamp: record.received_at.timestamp_millis(),
            metric_name: record.metric_name.clone(),
            metric_type: record.metric_type.clone(),
            value: record.value,
            unit: record.unit.clone(),
            service_name: record.service_name.clone(),
            namespace: record.namespace.clone(),
            attributes: map_column(&record.attributes),
            resource_attributes: map_column(&record.resource_attributes),
        }
    }
}

fn map_column(map: &std::collections::BTreeMap<String, String>) -> Vec<(String, String)> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

pub struct ClickHouseStore {
    client: Client,
    spans_table: String,
    metrics_table: String,
    closed: AtomicBool,
}

impl ClickHouseStore {
    /// Build the client and check the server answers `SELECT 1` within
    /// the connect timeout.
    pub async fn connect(config: &ClickHouseConfig) -> Result<Self, StoreError> {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);

        match time::timeout(config.connect_timeout(), client.query("SELECT 1").execute()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(url = %config.url, error = %e, "ClickHouse connectivity check failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(url = %config.url, timeout = ?config.connect_timeout(), "ClickHouse connectivity check timed out");
                return Err(StoreError::Unavailable(format!(
                    "no answer from {} within {:?}",
                    config.url,
                    config.connect_timeout()
                )));
            }
        }

        tracing::info!(
            url = %config.url,
            database = %config.database,
            "Connected to ClickHouse"
        );

        Ok(Self {
            client,
            spans_table: config.spans_table.clone(),
            metrics_table: config.metrics_table.clone(),
            closed: AtomicBool::new(false),
        })
    }

    async fn do_insert<T>(&self, table: &str, rows: &[T]) -> Result<(), StoreError>
    where
        T: Row + Serialize + Send + Sync + 'static,
        for<'a> T: Row<Value<'a> = T>,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let mut insert: Insert<T> = self.client.insert(table).await?;
        for row in rows {
            insert.write(row).await?;
        }
        insert.end().await?;
        Ok(())
    }
}

#[async_trait]
impl ColumnarStore for ClickHouseStore {
    async fn insert_spans(&self, rows: &[SpanRecord]) -> Result<(), StoreError> {
        let rows = rows
            .iter()
            .map(SpanRow::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        self.do_insert(&self.spans_table, &rows).await
    }

    async fn insert_metrics(&self, rows: &[MetricRecord]) -> Result<(), StoreError> {
        let rows: Vec<MetricRow> = rows.iter().map(MetricRow::from).collect();
        self.do_insert(&self.metrics_table, &rows).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!("ClickHouse store closed");
    }

    fn name(&self) -> &'static str {
        "clickhouse"
    }
}

/// One call observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Spans(usize),
    Metrics(usize),
    Close,
}

#[derive(Default)]
struct MemoryState {
    spans: Vec<SpanRecord>,
    metrics: Vec<MetricRecord>,
    calls: Vec<StoreCall>,
    closed: bool,
}

/// Keeps rows in memory and records every call in order. Used when
/// ClickHouse is disabled and as a test double.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock().spans.clone()
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.lock().metrics.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self, state: &MemoryState) -> Result<(), StoreError> {
        if state.closed {
            return Err(StoreError::Closed);
        }
        if self.failing.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ColumnarStore for MemoryStore {
    async fn insert_spans(&self, rows: &[SpanRecord]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Spans(rows.len()));
        self.check_writable(&state)?;
        state.spans.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_metrics(&self, rows: &[MetricRecord]) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Metrics(rows.len()));
        self.check_writable(&state)?;
        state.metrics.extend_from_slice(rows);
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.lock();
        state.calls.push(StoreCall::Close);
        state.closed = true;
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
