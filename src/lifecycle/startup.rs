//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the durable log backend
//! - Start the metrics exporter when enabled
//! - Build and spawn the requested components in dependency order
//! - Wait for every component to stop after shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned before traffic is accepted,
//!   including an unreachable columnar store
//! - The listener is bound before any task is spawned
//! - The in-memory log only connects components in the same process

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, HubConfig, LogBackend, LogConfig};
use crate::consumers::{
    ClickHouseStore, ColumnarStore, LineageForwarder, MarquezSink, MemoryStore, StoreError,
    TelemetryBatcher,
};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::log::{LogConsumer, LogError, LogProducer, MemoryLog, Topics};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("durable log: {0}")]
    Log(#[from] LogError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("lineage sink client: {0}")]
    Sink(#[from] reqwest::Error),

    #[error("columnar store: {0}")]
    Store(#[from] StoreError),
}

/// Which parts of the hub this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Gateway,
    LineageConsumer,
    TelemetryConsumer,
    All,
}

impl Role {
    fn runs_gateway(self) -> bool {
        matches!(self, Self::Gateway | Self::All)
    }

    fn runs_lineage(self) -> bool {
        matches!(self, Self::LineageConsumer | Self::All)
    }

    fn runs_telemetry(self) -> bool {
        matches!(self, Self::TelemetryConsumer | Self::All)
    }
}

/// The connected durable log backend.
pub enum DurableLog {
    Memory(MemoryLog),
    #[cfg(feature = "kafka")]
    Kafka(crate::log::kafka::KafkaProducer),
}

impl DurableLog {
    pub fn connect(config: &LogConfig) -> Result<Self, StartupError> {
        match config.backend {
            LogBackend::Memory => Ok(Self::Memory(MemoryLog::new(config.partitions))),
            #[cfg(feature = "kafka")]
            LogBackend::Kafka => Ok(Self::Kafka(crate::log::kafka::KafkaProducer::new(config)?)),
            #[cfg(not(feature = "kafka"))]
            LogBackend::Kafka => Err(ConfigError::Unsupported(
                "log.backend = \"kafka\" needs a build with the `kafka` feature".to_string(),
            )
            .into()),
        }
    }

    pub fn producer(&self) -> Arc<dyn LogProducer> {
        match self {
            Self::Memory(log) => Arc::new(log.clone()),
            #[cfg(feature = "kafka")]
            Self::Kafka(producer) => Arc::new(producer.clone()),
        }
    }

    pub fn consumer(
        &self,
        #[allow(unused_variables)] config: &LogConfig,
        group: &str,
        topics: &[&str],
    ) -> Result<Box<dyn LogConsumer>, StartupError> {
        match self {
            Self::Memory(log) => Ok(Box::new(log.subscribe(group, topics))),
            #[cfg(feature = "kafka")]
            Self::Kafka(_) => Ok(Box::new(crate::log::kafka::KafkaConsumer::new(
                config, group, topics,
            )?)),
        }
    }

    pub fn close(&self) {
        match self {
            Self::Memory(log) => log.close(),
            #[cfg(feature = "kafka")]
            Self::Kafka(_) => {}
        }
    }
}

/// Start `role` and run until a shutdown signal stops every component.
pub async fn run(config: HubConfig, role: Role) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse().map_err(|_| {
            ConfigError::Unsupported(format!(
                "observability.metrics_address '{}' is not a socket address",
                config.observability.metrics_address
            ))
        })?;
        metrics::init_metrics(addr)?;
        tracing::info!(address = %addr, "Metrics exporter listening");
    }

    let log = DurableLog::connect(&config.log)?;
    if matches!(log, DurableLog::Memory(_)) && role != Role::All {
        tracing::warn!(
            role = ?role,
            "In-memory log only reaches components in this process; run `all` or use the kafka backend"
        );
    }

    // Downstream stores are checked before any component starts.
    let store: Option<Arc<dyn ColumnarStore>> = if !role.runs_telemetry() {
        None
    } else if config.clickhouse.enabled {
        Some(Arc::new(ClickHouseStore::connect(&config.clickhouse).await?))
    } else {
        tracing::warn!("ClickHouse disabled, telemetry rows kept in memory");
        Some(Arc::new(MemoryStore::new()))
    };

    let shutdown = Arc::new(Shutdown::new());
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if role.runs_gateway() {
        let listener = TcpListener::bind(&config.service.bind_address).await?;
        let server = HttpServer::new(&config, log.producer());
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(listener, rx).await {
                tracing::error!(error = %e, "HTTP server failed");
            }
        }));
    }

    let topics = Topics::from_config(&config.log);

    if role.runs_lineage() {
        let consumer = log.consumer(&config.log, &config.log.lineage_group, &[topics.lineage.as_str()])?;
        let sink = MarquezSink::new(&config.forwarder)?;
        tracing::info!(url = %sink.url(), "Lineage sink configured");
        let forwarder = LineageForwarder::new(&config.forwarder, Arc::new(sink));
        tasks.push(tokio::spawn(forwarder.run(consumer, shutdown.subscribe())));
    }

    if let Some(store) = store {
        let consumer = log.consumer(
            &config.log,
            &config.log.telemetry_group,
            &[topics.spans.as_str(), topics.metrics.as_str()],
        )?;
        let batcher = Arc::new(TelemetryBatcher::new(&config.batcher, &topics, store));
        tasks.push(tokio::spawn(batcher.run(consumer, shutdown.subscribe())));
    }

    tracing::info!(role = ?role, components = tasks.len(), "Lineage hub started");
    let signals = spawn_signal_listener(shutdown.clone());

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Component task failed");
        }
    }
    signals.abort();
    log.close();

    tracing::info!("Shutdown complete");
    Ok(())
}
