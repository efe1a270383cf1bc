//! Lineage-graph service client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::ForwarderConfig;

pub const NAMESPACE_HEADER: &str = "X-Namespace";

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination of forwarded lineage events.
#[async_trait]
pub trait LineageSink: Send + Sync + 'static {
    async fn send(&self, event: &Value, namespace: &str) -> Result<(), ForwardError>;
}

/// Posts events to a Marquez-compatible `/api/v1/lineage` endpoint.
/// Only `201 Created` counts as success.
pub struct MarquezSink {
    client: reqwest::Client,
    url: String,
}

impl MarquezSink {
    pub fn new(config: &ForwarderConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.endpoint
        );
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LineageSink for MarquezSink {
    async fn send(&self, event: &Value, namespace: &str) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(&self.url)
            .header(NAMESPACE_HEADER, namespace)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ForwardError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
