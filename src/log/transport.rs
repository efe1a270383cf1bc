//! Producer and consumer seams over a partitioned append-only log.

use std::time::Duration;

use async_trait::async_trait;

use crate::log::error::LogError;
use crate::log::record::{ConsumedMessage, Delivery, LogMessage};

/// Appends messages and waits for the broker to acknowledge them.
#[async_trait]
pub trait LogProducer: Send + Sync + 'static {
    /// Append `message`, resolving once delivery is acknowledged or `timeout`
    /// expires.
    async fn send(&self, message: LogMessage, timeout: Duration) -> Result<Delivery, LogError>;

    /// Wait for all in-flight deliveries.
    async fn flush(&self, timeout: Duration) -> Result<(), LogError>;

    /// Whether the broker is reachable.
    async fn is_healthy(&self) -> bool;

    /// Backend name used in logs and health output.
    fn name(&self) -> &'static str;
}

/// Reads one consumer group's share of its subscribed topics.
#[async_trait]
pub trait LogConsumer: Send + 'static {
    /// Next message, waiting for one to arrive.
    async fn recv(&mut self) -> Result<ConsumedMessage, LogError>;

    /// Mark `message` (and everything before it on its partition) consumed.
    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), LogError>;
}
