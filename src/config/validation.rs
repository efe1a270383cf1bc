//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, quotas within namespace limits)
//! - Validate addresses and URLs before any connection is attempted
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HubConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HubConfig;
use crate::namespace::{
    is_valid_namespace_name, MAX_DAILY_QUOTA, MAX_RETENTION_DAYS, MIN_DAILY_QUOTA,
    MIN_RETENTION_DAYS,
};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "service.bind_address",
            format!("'{}' is not a socket address", config.service.bind_address),
        ));
    }
    if config.service.request_timeout_secs == 0 {
        errors.push(ValidationError::new("service.request_timeout_secs", "must be > 0"));
    }
    if config.service.max_body_size == 0 {
        errors.push(ValidationError::new("service.max_body_size", "must be > 0"));
    }

    let log = &config.log;
    for (field, topic) in [
        ("log.lineage_topic", &log.lineage_topic),
        ("log.spans_topic", &log.spans_topic),
        ("log.metrics_topic", &log.metrics_topic),
    ] {
        if topic.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }
    if log.spans_topic == log.metrics_topic {
        errors.push(ValidationError::new(
            "log.metrics_topic",
            "spans and metrics must use different topics",
        ));
    }
    if log.publish_timeout_secs == 0 {
        errors.push(ValidationError::new("log.publish_timeout_secs", "must be > 0"));
    }
    if log.partitions == 0 {
        errors.push(ValidationError::new("log.partitions", "must be > 0"));
    }

    let ns = &config.namespaces;
    if !is_valid_namespace_name(&ns.default_namespace) {
        errors.push(ValidationError::new(
            "namespaces.default_namespace",
            format!("'{}' is not a valid namespace name", ns.default_namespace),
        ));
    }
    if !(MIN_DAILY_QUOTA..=MAX_DAILY_QUOTA).contains(&ns.default_daily_quota) {
        errors.push(ValidationError::new(
            "namespaces.default_daily_quota",
            format!("must be between {} and {}", MIN_DAILY_QUOTA, MAX_DAILY_QUOTA),
        ));
    }
    if !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&ns.default_retention_days) {
        errors.push(ValidationError::new(
            "namespaces.default_retention_days",
            format!("must be between {} and {}", MIN_RETENTION_DAYS, MAX_RETENTION_DAYS),
        ));
    }
    if ns.batch_ceiling == 0 {
        errors.push(ValidationError::new("namespaces.batch_ceiling", "must be > 0"));
    }

    if config.auth.api_key_validation && config.auth.api_keys.is_empty() {
        errors.push(ValidationError::new(
            "auth.api_keys",
            "api key validation is enabled but no keys are configured",
        ));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_minute == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_minute", "must be > 0"));
    }

    if let Err(e) = url::Url::parse(&config.forwarder.base_url) {
        errors.push(ValidationError::new(
            "forwarder.base_url",
            format!("'{}' is not a URL: {}", config.forwarder.base_url, e),
        ));
    }
    if !config.forwarder.endpoint.starts_with('/') {
        errors.push(ValidationError::new("forwarder.endpoint", "must start with '/'"));
    }
    if config.forwarder.timeout_secs == 0 {
        errors.push(ValidationError::new("forwarder.timeout_secs", "must be > 0"));
    }
    if !is_valid_namespace_name(&config.forwarder.default_namespace) {
        errors.push(ValidationError::new(
            "forwarder.default_namespace",
            "is not a valid namespace name",
        ));
    }

    let batcher = &config.batcher;
    if batcher.batch_size == 0 {
        errors.push(ValidationError::new("batcher.batch_size", "must be > 0"));
    }
    if batcher.batch_timeout_secs == 0 {
        errors.push(ValidationError::new("batcher.batch_timeout_secs", "must be > 0"));
    }
    if batcher.flush_interval_secs == 0 {
        errors.push(ValidationError::new("batcher.flush_interval_secs", "must be > 0"));
    }

    if config.clickhouse.enabled {
        if let Err(e) = url::Url::parse(&config.clickhouse.url) {
            errors.push(ValidationError::new(
                "clickhouse.url",
                format!("'{}' is not a URL: {}", config.clickhouse.url, e),
            ));
        }
        if config.clickhouse.spans_table.is_empty() || config.clickhouse.metrics_table.is_empty() {
            errors.push(ValidationError::new("clickhouse", "table names must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&HubConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = HubConfig::default();
        config.service.bind_address = "not-an-address".into();
        config.namespaces.default_namespace = "Bad_Name".into();
        config.batcher.batch_size = 0;
        config.forwarder.base_url = "::nope".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(errors.len(), 4);
        assert!(fields.contains(&"service.bind_address"));
        assert!(fields.contains(&"namespaces.default_namespace"));
        assert!(fields.contains(&"batcher.batch_size"));
        assert!(fields.contains(&"forwarder.base_url"));
    }

    #[test]
    fn test_clickhouse_url_ignored_when_disabled() {
        let mut config = HubConfig::default();
        config.clickhouse.enabled = false;
        config.clickhouse.url = "not a url".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_auth_requires_keys() {
        let mut config = HubConfig::default();
        config.auth.api_key_validation = true;
        config.auth.api_keys.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "auth.api_keys");
    }
}
