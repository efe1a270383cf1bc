//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the hub.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the lineage hub.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HubConfig {
    /// Service identity and HTTP listener settings.
    pub service: ServiceConfig,

    /// Durable log connection and topic names.
    pub log: LogConfig,

    /// Namespace isolation, auto-creation and quota policy.
    pub namespaces: NamespaceSettings,

    /// API key authentication.
    pub auth: AuthConfig,

    /// Per-namespace request rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Lineage forwarder (consumer) settings.
    pub forwarder: ForwarderConfig,

    /// Telemetry batcher (consumer) settings.
    pub batcher: BatcherConfig,

    /// Columnar store connection.
    pub clickhouse: ClickHouseConfig,

    /// Health endpoint dependency probing.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Service identity and HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Human readable service name reported by `/health`.
    pub name: String,

    /// Service version reported by `/health`.
    pub version: String,

    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "Data Lineage Hub".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Which durable log implementation to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBackend {
    /// In-process log, shared by components running in the same process.
    Memory,
    /// Kafka-compatible broker (requires the `kafka` feature).
    Kafka,
}

/// Durable log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log implementation.
    pub backend: LogBackend,

    /// Broker bootstrap servers (Kafka backend only).
    pub bootstrap_servers: String,

    /// Topic carrying OpenLineage events.
    pub lineage_topic: String,

    /// Topic carrying OpenTelemetry spans.
    pub spans_topic: String,

    /// Topic carrying OpenTelemetry metrics.
    pub metrics_topic: String,

    /// Upper bound on waiting for a delivery acknowledgment, in seconds.
    pub publish_timeout_secs: u64,

    /// Consumer group of the lineage forwarder.
    pub lineage_group: String,

    /// Consumer group of the telemetry batcher.
    pub telemetry_group: String,

    /// Partitions per topic for the in-memory backend.
    pub partitions: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            backend: LogBackend::Memory,
            bootstrap_servers: "localhost:9092".to_string(),
            lineage_topic: "openlineage-events".to_string(),
            spans_topic: "otel-spans".to_string(),
            metrics_topic: "otel-metrics".to_string(),
            publish_timeout_secs: 10,
            lineage_group: "lineage-consumer-group".to_string(),
            telemetry_group: "otel-consumer-group".to_string(),
            partitions: 4,
        }
    }
}

impl LogConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

/// How `check_quota` decides whether a request fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaMode {
    /// Fixed per-request ceiling only.
    BatchCeiling,
    /// Per-request ceiling plus a per-namespace counter reset every UTC day.
    Daily,
}

/// Namespace policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceSettings {
    /// Namespace seeded at startup and used when none can be resolved.
    pub default_namespace: String,

    /// Enforce namespace access checks at all.
    pub isolation_enabled: bool,

    /// Create unknown namespaces on first ingestion.
    pub auto_create: bool,

    /// Daily event quota applied when a namespace is created without one.
    pub default_daily_quota: u64,

    /// Retention applied to new namespaces, in days.
    pub default_retention_days: u32,

    /// Maximum items accepted in a single ingestion request.
    pub batch_ceiling: u64,

    /// Quota accounting mode.
    pub quota_mode: QuotaMode,

    /// Let every identity list every namespace.
    pub cross_namespace_discovery: bool,

    /// Filter `list` results by owner/viewer membership.
    pub require_permissions: bool,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        Self {
            default_namespace: "demo-pipeline".to_string(),
            isolation_enabled: true,
            auto_create: true,
            default_daily_quota: 100_000,
            default_retention_days: 30,
            batch_ceiling: 1000,
            quota_mode: QuotaMode::BatchCeiling,
            cross_namespace_discovery: true,
            require_permissions: false,
        }
    }
}

/// API key authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a valid `Authorization: Bearer <key>` on non-public routes.
    pub api_key_validation: bool,

    /// Static API key to identity mapping.
    pub api_keys: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let api_keys = [
            ("demo-api-key", "demo@data-lineage-hub.com"),
            ("team-data-platform-key", "admin@team-data-platform.com"),
            ("team-ml-platform-key", "admin@team-ml-platform.com"),
            ("enterprise-admin-key", "admin@enterprise.com"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            api_key_validation: false,
            api_keys,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Ingestion requests allowed per minute per namespace.
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 1000,
        }
    }
}

/// Lineage forwarder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Base URL of the lineage-graph service.
    pub base_url: String,

    /// Path events are posted to.
    pub endpoint: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Namespace used when neither header nor `job.namespace` carry one.
    pub default_namespace: String,

    /// Extra attempts after a failed forward. Zero keeps forwarding best-effort.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            endpoint: "/api/v1/lineage".to_string(),
            timeout_secs: 30,
            default_namespace: "demo-pipeline".to_string(),
            max_retries: 0,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5000,
        }
    }
}

impl ForwarderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Telemetry batcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Records per kind that trigger an immediate flush.
    pub batch_size: usize,

    /// Maximum age of a non-empty batch before it is flushed, in seconds.
    pub batch_timeout_secs: u64,

    /// Period of the background flush timer, in seconds.
    pub flush_interval_secs: u64,

    /// Upper bound on the final flush during shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_timeout_secs: 30,
            flush_interval_secs: 5,
            shutdown_timeout_secs: 30,
        }
    }
}

impl BatcherConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// ClickHouse connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    /// Write to ClickHouse. When disabled rows are kept in an in-memory store.
    pub enabled: bool,

    /// ClickHouse HTTP URL (e.g., "http://localhost:8123").
    pub url: String,

    /// Database name.
    pub database: String,

    /// Username for authentication.
    pub user: String,

    /// Password for authentication.
    pub password: String,

    /// Table receiving spans.
    pub spans_table: String,

    /// Table receiving metrics.
    pub metrics_table: String,

    /// Startup connectivity check timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8123".to_string(),
            database: "otel".to_string(),
            user: "default".to_string(),
            password: String::new(),
            spans_table: "traces".to_string(),
            metrics_table: "metrics".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl ClickHouseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe the lineage sink and ClickHouse on every `/health` call.
    pub check_dependencies: bool,

    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_dependencies: true,
            probe_timeout_secs: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
