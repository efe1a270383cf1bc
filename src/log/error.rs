//! Durable log errors.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("delivery not acknowledged within {0:?}")]
    Timeout(Duration),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("log unavailable: {0}")]
    Unavailable(String),

    #[error("log closed")]
    Closed,

    #[error("failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid log client configuration: {0}")]
    Config(String),
}
