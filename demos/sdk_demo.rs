use sdk_rust::{lineage_event, new_run_id, HubClient};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = HubClient::new("http://localhost:8000");
    let namespace = "demo-pipeline";

    // 1. Check the hub
    let health = client.health().await?;
    println!("Hub status: {}", health["status"]);

    // 2. Report one run: START then COMPLETE
    let run_id = new_run_id();
    let events = vec![
        lineage_event("START", namespace, "daily-etl", &run_id, &["raw/orders.csv"], &[]),
        lineage_event(
            "COMPLETE",
            namespace,
            "daily-etl",
            &run_id,
            &["raw/orders.csv"],
            &["clean/orders.parquet"],
        ),
    ];
    let response = client
        .send_lineage_events(namespace, events, Some("sdk-demo"))
        .await?;
    println!(
        "Lineage: {} accepted, {} rejected",
        response.accepted, response.rejected
    );

    // 3. Emit a span and a metric for the same run
    let traces = vec![json!({
        "traceId": run_id,
        "spanId": "etl-root",
        "operationName": "daily-etl",
        "serviceName": "etl-runner",
        "duration": 2_500_000,
    })];
    let metrics = vec![json!({
        "name": "rows_processed",
        "type": "counter",
        "value": 1200,
        "serviceName": "etl-runner",
    })];
    let response = client.send_telemetry(namespace, traces, metrics).await?;
    println!(
        "Telemetry: {} spans, {} metrics accepted",
        response.traces_accepted, response.metrics_accepted
    );

    Ok(())
}
