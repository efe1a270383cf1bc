//! Namespace errors.

use thiserror::Error;

use crate::namespace::model::{MAX_DAILY_QUOTA, MAX_RETENTION_DAYS, MIN_DAILY_QUOTA, MIN_RETENTION_DAYS};

/// Errors raised by namespace registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    #[error("Invalid namespace name: {0}. Must be 3-50 characters, lowercase alphanumeric with dashes")]
    InvalidName(String),

    #[error("A namespace needs at least one owner")]
    EmptyOwners,

    #[error("Daily event quota {0} outside {min}..={max}", min = MIN_DAILY_QUOTA, max = MAX_DAILY_QUOTA)]
    QuotaOutOfRange(u64),

    #[error("Retention of {0} days outside {min}..={max}", min = MIN_RETENTION_DAYS, max = MAX_RETENTION_DAYS)]
    RetentionOutOfRange(u32),

    #[error("Namespace '{0}' already exists")]
    AlreadyExists(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidUpdate { field: String, reason: String },
}
