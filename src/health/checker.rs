//! Dependency probes behind `GET /health`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time;

use crate::config::HubConfig;
use crate::log::LogProducer;

pub const HEALTHY: &str = "healthy";
pub const UNHEALTHY: &str = "unhealthy";
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub version: String,
    pub dependencies: BTreeMap<String, String>,
}

pub struct HealthChecker {
    producer: Arc<dyn LogProducer>,
    client: reqwest::Client,
    service: String,
    version: String,
    lineage_url: String,
    clickhouse_ping: Option<String>,
    check_dependencies: bool,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(config: &HubConfig, producer: Arc<dyn LogProducer>) -> Self {
        let clickhouse_ping = config
            .clickhouse
            .enabled
            .then(|| format!("{}/ping", config.clickhouse.url.trim_end_matches('/')));

        Self {
            producer,
            client: reqwest::Client::new(),
            service: config.service.name.clone(),
            version: config.service.version.clone(),
            lineage_url: config.forwarder.base_url.clone(),
            clickhouse_ping,
            check_dependencies: config.health.check_dependencies,
            timeout: Duration::from_secs(config.health.probe_timeout_secs),
        }
    }

    /// Probe every dependency concurrently. The hub itself reports
    /// `healthy` unless the durable log is unreachable.
    pub async fn check(&self) -> HealthReport {
        let (log, lineage, clickhouse) = tokio::join!(
            self.check_log(),
            self.probe_lineage_sink(),
            self.probe_clickhouse(),
        );

        let status = if log == HEALTHY { HEALTHY } else { "degraded" };
        let dependencies = BTreeMap::from([
            ("durable_log".to_string(), log.to_string()),
            ("lineage_sink".to_string(), lineage.to_string()),
            ("clickhouse".to_string(), clickhouse.to_string()),
        ]);

        HealthReport {
            status: status.to_string(),
            timestamp: Utc::now(),
            service: self.service.clone(),
            version: self.version.clone(),
            dependencies,
        }
    }

    async fn check_log(&self) -> &'static str {
        match time::timeout(self.timeout, self.producer.is_healthy()).await {
            Ok(true) => HEALTHY,
            Ok(false) => {
                tracing::warn!(backend = self.producer.name(), "Durable log unhealthy");
                UNHEALTHY
            }
            Err(_) => {
                tracing::warn!(backend = self.producer.name(), "Durable log health check timed out");
                UNHEALTHY
            }
        }
    }

    /// Any HTTP answer counts: the lineage service root need not be 2xx.
    async fn probe_lineage_sink(&self) -> &'static str {
        if !self.check_dependencies {
            return UNKNOWN;
        }
        match time::timeout(self.timeout, self.client.get(&self.lineage_url).send()).await {
            Ok(Ok(_)) => HEALTHY,
            Ok(Err(e)) => {
                tracing::warn!(url = %self.lineage_url, error = %e, "Lineage sink unreachable");
                UNHEALTHY
            }
            Err(_) => {
                tracing::warn!(url = %self.lineage_url, "Lineage sink probe timed out");
                UNHEALTHY
            }
        }
    }

    async fn probe_clickhouse(&self) -> &'static str {
        let Some(url) = self.clickhouse_ping.as_deref().filter(|_| self.check_dependencies) else {
            return UNKNOWN;
        };
        match time::timeout(self.timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) if response.status().is_success() => HEALTHY,
            Ok(Ok(response)) => {
                tracing::warn!(url = %url, status = %response.status(), "ClickHouse ping failed");
                UNHEALTHY
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "ClickHouse unreachable");
                UNHEALTHY
            }
            Err(_) => {
                tracing::warn!(url = %url, "ClickHouse ping timed out");
                UNHEALTHY
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;

    fn config_without_probes() -> HubConfig {
        let mut config = HubConfig::default();
        config.health.check_dependencies = false;
        config
    }

    #[tokio::test]
    async fn test_report_without_dependency_probes() {
        let log = MemoryLog::new(1);
        let checker = HealthChecker::new(&config_without_probes(), Arc::new(log));
        let report = checker.check().await;

        assert_eq!(report.status, "healthy");
        assert_eq!(report.service, "Data Lineage Hub");
        assert_eq!(report.dependencies["durable_log"], "healthy");
        assert_eq!(report.dependencies["lineage_sink"], "unknown");
        assert_eq!(report.dependencies["clickhouse"], "unknown");
    }

    #[tokio::test]
    async fn test_unreachable_log_degrades_status() {
        let log = MemoryLog::new(1);
        log.set_available(false);
        let checker = HealthChecker::new(&config_without_probes(), Arc::new(log));
        let report = checker.check().await;

        assert_eq!(report.status, "degraded");
        assert_eq!(report.dependencies["durable_log"], "unhealthy");
    }

    #[tokio::test]
    async fn test_unreachable_sinks_are_unhealthy() {
        let mut config = HubConfig::default();
        // Nothing listens on port 9 locally.
        config.forwarder.base_url = "http://127.0.0.1:9".into();
        config.clickhouse.url = "http://127.0.0.1:9".into();
        let checker = HealthChecker::new(&config, Arc::new(MemoryLog::new(1)));
        let report = checker.check().await;

        assert_eq!(report.dependencies["lineage_sink"], "unhealthy");
        assert_eq!(report.dependencies["clickhouse"], "unhealthy");
        assert_eq!(report.status, "healthy");
    }
}
