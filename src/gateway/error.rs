//! Request-level gateway failures. Per-item failures are reported in the
//! response body instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Access denied to namespace '{0}'")]
    AccessDenied(String),

    #[error("Rate limit exceeded for namespace '{0}'")]
    RateLimited(String),

    #[error("Event quota exceeded for namespace '{namespace}' ({requested} events requested)")]
    QuotaExceeded { namespace: String, requested: u64 },
}
