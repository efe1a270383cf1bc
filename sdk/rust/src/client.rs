use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with a non-success status; `detail` is its message.
    #[error("hub returned {status}: {detail}")]
    Api { status: StatusCode, detail: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageIngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<String>,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryIngestResponse {
    pub traces_accepted: usize,
    pub traces_rejected: usize,
    pub metrics_accepted: usize,
    pub metrics_rejected: usize,
    pub errors: Vec<String>,
    pub namespace: String,
}

pub struct HubClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HubClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.execute(self.request(reqwest::Method::GET, "/health")).await
    }

    pub async fn send_lineage_events(
        &self,
        namespace: &str,
        events: Vec<Value>,
        source: Option<&str>,
    ) -> Result<LineageIngestResponse, ClientError> {
        let body = json!({ "namespace": namespace, "events": events, "source": source });
        self.execute(self.request(reqwest::Method::POST, "/lineage/ingest").json(&body))
            .await
    }

    pub async fn send_telemetry(
        &self,
        namespace: &str,
        traces: Vec<Value>,
        metrics: Vec<Value>,
    ) -> Result<TelemetryIngestResponse, ClientError> {
        let body = json!({ "namespace": namespace, "traces": traces, "metrics": metrics });
        self.execute(self.request(reqwest::Method::POST, "/telemetry/ingest").json(&body))
            .await
    }

    pub async fn create_namespace(&self, request: &Value) -> Result<Value, ClientError> {
        self.execute(self.request(reqwest::Method::POST, "/namespaces").json(request))
            .await
    }

    pub async fn get_namespace(&self, name: &str) -> Result<Value, ClientError> {
        self.execute(self.request(reqwest::Method::GET, &format!("/namespaces/{}", name)))
            .await
    }

    pub async fn list_namespaces(&self) -> Result<Value, ClientError> {
        self.execute(self.request(reqwest::Method::GET, "/namespaces")).await
    }

    pub async fn update_namespace(&self, name: &str, changes: &Value) -> Result<Value, ClientError> {
        self.execute(
            self.request(reqwest::Method::PATCH, &format!("/namespaces/{}", name))
                .json(changes),
        )
        .await
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ClientError::Api { status, detail });
        }

        Ok(response.json::<T>().await?)
    }
}
