//! Kafka-backed durable log (`--features kafka`).

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::config::LogConfig;
use crate::log::error::LogError;
use crate::log::record::{ConsumedMessage, Delivery, LogMessage};
use crate::log::transport::{LogConsumer, LogProducer};

const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: &LogConfig) -> Result<Self, LogError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", "lineage-hub-producer")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("compression.type", "snappy")
            .set(
                "message.timeout.ms",
                (config.publish_timeout().as_millis() as u64).to_string(),
            )
            .create()
            .map_err(|e| LogError::Config(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl LogProducer for KafkaProducer {
    async fn send(&self, message: LogMessage, timeout: Duration) -> Result<Delivery, LogError> {
        let mut headers = OwnedHeaders::new();
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_bytes()),
            });
        }

        let mut record = FutureRecord::<str, [u8]>::to(&message.topic)
            .payload(&message.value)
            .headers(headers);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }

        match self.producer.send(record, Timeout::After(timeout)).await {
            Ok(delivery) => Ok(Delivery {
                partition: delivery.0,
                offset: delivery.1,
            }),
            Err((e, _)) => Err(LogError::Delivery(e.to_string())),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<(), LogError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| LogError::Unavailable(e.to_string()))?
            .map_err(|e| LogError::Delivery(e.to_string()))
    }

    async fn is_healthy(&self) -> bool {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, METADATA_TIMEOUT)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "kafka"
    }
}

/// Group member with manual offset storage: offsets are stored on
/// [`LogConsumer::commit`] and auto-committed in the background.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &LogConfig, group: &str, topics: &[&str]) -> Result<Self, LogError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", group)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()
            .map_err(|e| LogError::Config(e.to_string()))?;

        consumer
            .subscribe(topics)
            .map_err(|e| LogError::Config(e.to_string()))?;

        tracing::info!(group = %group, topics = ?topics, "Kafka consumer subscribed");
        Ok(Self { consumer })
    }
}

#[async_trait]
impl LogConsumer for KafkaConsumer {
    async fn recv(&mut self) -> Result<ConsumedMessage, LogError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| LogError::Unavailable(e.to_string()))?;

        let headers = message
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| {
                        let value = h.value.map(String::from_utf8_lossy).unwrap_or_default();
                        (h.key.to_string(), value.into_owned())
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ConsumedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            headers,
        })
    }

    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), LogError> {
        self.consumer
            .store_offset(&message.topic, message.partition, message.offset)
            .map_err(|e| LogError::Delivery(e.to_string()))
    }
}
