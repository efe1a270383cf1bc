//! Bearer API-key authentication.
//!
//! Keys map to identities through a static table. Public endpoints pass
//! without a key; every other route needs a valid one while validation is on.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AuthConfig;
use crate::http::error::ApiError;

const API_PREFIX: &str = "/api/v1";
const PUBLIC_PATHS: &[&str] = &["/health", "/docs", "/openapi.json", "/redoc"];
const PUBLIC_PREFIXES: &[&str] = &["/docs", "/redoc", "/static"];

/// Caller identity attached to every request by [`auth_middleware`].
/// `None` when validation is off or the caller sent no valid key on a
/// public route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(pub Option<String>);

impl Identity {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct ApiKeyValidator {
    enabled: bool,
    keys: HashMap<String, String>,
}

impl ApiKeyValidator {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            enabled: config.api_key_validation,
            keys: config.api_keys.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn identify(&self, api_key: &str) -> Option<&str> {
        self.keys.get(api_key).map(String::as_str)
    }

    fn identify_headers(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers)
            .and_then(|key| self.identify(key))
            .map(str::to_string)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

/// Whether `path` needs a key. Routes under `/api/v1` follow the same rules
/// as their root-mounted twins.
pub fn requires_authentication(path: &str) -> bool {
    let path = match path.strip_prefix(API_PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    if PUBLIC_PATHS.contains(&path) {
        return false;
    }
    !PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

pub async fn auth_middleware(
    State(validator): State<Arc<ApiKeyValidator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !validator.is_enabled() {
        request.extensions_mut().insert(Identity(None));
        return next.run(request).await;
    }

    let identity = validator.identify_headers(request.headers());
    let path = request.uri().path();

    if identity.is_none() && requires_authentication(path) {
        tracing::warn!(
            path = %path,
            has_credentials = request.headers().contains_key(header::AUTHORIZATION),
            "Authentication required but not provided"
        );
        return ApiError::Unauthorized.into_response();
    }

    if let Some(identity) = &identity {
        tracing::debug!(identity = %identity, path = %path, "Authenticated request");
    }
    request.extensions_mut().insert(Identity(identity));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_public_paths() {
        for public in ["/health", "/docs", "/docs/index.html", "/redoc", "/openapi.json", "/static/a.css", "/api/v1/health"] {
            assert!(!requires_authentication(public), "{public}");
        }
        for protected in ["/", "/lineage/ingest", "/namespaces", "/api/v1/namespaces/x", "/api/v1", "/healthz"] {
            assert!(requires_authentication(protected), "{protected}");
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer demo-api-key"));
        assert_eq!(bearer_token(&headers), Some("demo-api-key"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  spaced "));
        assert_eq!(bearer_token(&headers), Some("spaced"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_identify_uses_static_table() {
        let validator = ApiKeyValidator::from_config(&AuthConfig {
            api_key_validation: true,
            ..Default::default()
        });
        assert_eq!(validator.identify("demo-api-key"), Some("demo@data-lineage-hub.com"));
        assert_eq!(validator.identify("nope"), None);
    }
}
