//! OpenLineage event construction.

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

pub const PRODUCER: &str = "lineage-hub-sdk-rust";

pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// A minimal run event with file inputs and outputs.
pub fn lineage_event(
    event_type: &str,
    namespace: &str,
    job_name: &str,
    run_id: &str,
    inputs: &[&str],
    outputs: &[&str],
) -> Value {
    json!({
        "eventType": event_type,
        "eventTime": Utc::now().to_rfc3339(),
        "run": { "runId": run_id },
        "job": { "namespace": namespace, "name": job_name },
        "inputs": datasets(inputs),
        "outputs": datasets(outputs),
        "producer": PRODUCER,
    })
}

fn datasets(paths: &[&str]) -> Vec<Value> {
    paths
        .iter()
        .map(|path| json!({ "namespace": "file", "name": path }))
        .collect()
}
