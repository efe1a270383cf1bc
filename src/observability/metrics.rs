//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hub_ingest_items_total` (counter): items seen by the gateway, by stream and outcome
//! - `hub_publish_duration_seconds` (histogram): time to an acknowledged publish
//! - `hub_flush_total` (counter): batch flushes by kind and outcome
//! - `hub_flush_rows_total` (counter): rows written to the columnar store
//! - `hub_forward_total` (counter): lineage forwards by outcome
//! - `hub_rate_limited_total` (counter): requests refused by the rate limiter
//! - `hub_batch_pending` (gauge): records waiting in a batch
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests record unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const INGEST_ITEMS: &str = "hub_ingest_items_total";
pub const PUBLISH_DURATION: &str = "hub_publish_duration_seconds";
pub const FLUSH_TOTAL: &str = "hub_flush_total";
pub const FLUSH_ROWS: &str = "hub_flush_rows_total";
pub const FORWARD_TOTAL: &str = "hub_forward_total";
pub const RATE_LIMITED: &str = "hub_rate_limited_total";
pub const BATCH_PENDING: &str = "hub_batch_pending";

/// Install the Prometheus recorder with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(INGEST_ITEMS, "Items received by the ingestion gateway");
    describe_histogram!(PUBLISH_DURATION, "Time until the durable log acknowledged a publish");
    describe_counter!(FLUSH_TOTAL, "Batch flushes to the columnar store");
    describe_counter!(FLUSH_ROWS, "Rows written to the columnar store");
    describe_counter!(FORWARD_TOTAL, "Lineage events forwarded to the lineage service");
    describe_counter!(RATE_LIMITED, "Requests refused by the per-namespace rate limiter");
    describe_gauge!(BATCH_PENDING, "Records buffered and not yet flushed");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_ingest(stream: &'static str, outcome: &'static str, count: u64) {
    if count > 0 {
        counter!(INGEST_ITEMS, "stream" => stream, "outcome" => outcome).increment(count);
    }
}

pub fn record_publish(topic: &str, success: bool, started: Instant) {
    let outcome = if success { "ok" } else { "error" };
    histogram!(PUBLISH_DURATION, "topic" => topic.to_string(), "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_flush(kind: &'static str, outcome: &'static str, rows: usize) {
    counter!(FLUSH_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
    if outcome == "ok" {
        counter!(FLUSH_ROWS, "kind" => kind).increment(rows as u64);
    }
}

pub fn record_forward(outcome: &'static str) {
    counter!(FORWARD_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(namespace: &str) {
    counter!(RATE_LIMITED, "namespace" => namespace.to_string()).increment(1);
}

pub fn set_batch_pending(kind: &'static str, pending: usize) {
    gauge!(BATCH_PENDING, "kind" => kind).set(pending as f64);
}
