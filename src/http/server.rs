//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the Axum router with every API route
//! - Mount routes at the root and under `/api/v1`
//! - Wire up middleware (auth, body limit, timeout, request ID, tracing)
//! - Serve until the shutdown coordinator fires, then flush the log

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{HubConfig, ServiceConfig};
use crate::gateway::IngestionGateway;
use crate::health::HealthChecker;
use crate::http::auth::{auth_middleware, ApiKeyValidator};
use crate::http::handlers;
use crate::log::{EventPublisher, LogProducer};
use crate::namespace::NamespaceRegistry;
use crate::security::NamespaceRateLimiter;

const API_PREFIX: &str = "/api/v1";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
    pub health: Arc<HealthChecker>,
    pub service: Arc<ServiceConfig>,
}

/// HTTP server for the ingestion gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Assemble the gateway and its dependencies around `producer`.
    pub fn new(config: &HubConfig, producer: Arc<dyn LogProducer>) -> Self {
        let registry = Arc::new(NamespaceRegistry::from_config(config));
        let publisher = EventPublisher::new(producer.clone(), &config.log);
        let limiter = NamespaceRateLimiter::new(&config.rate_limit);

        let state = AppState {
            gateway: Arc::new(IngestionGateway::new(registry, publisher, limiter)),
            health: Arc::new(HealthChecker::new(config, producer)),
            service: Arc::new(config.service.clone()),
        };
        let validator = Arc::new(ApiKeyValidator::from_config(&config.auth));

        let router = Self::build_router(config, state.clone(), validator);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HubConfig, state: AppState, validator: Arc<ApiKeyValidator>) -> Router {
        Router::new()
            .route("/", get(handlers::root))
            .merge(api_routes())
            .nest(API_PREFIX, api_routes())
            .with_state(state)
            .layer(middleware::from_fn_with_state(validator, auth_middleware))
            .layer(DefaultBodyLimit::max(config.service.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.service.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires, then flush pending publishes.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        self.state.gateway.publisher().flush().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/lineage/ingest", post(handlers::ingest_lineage))
        .route("/telemetry/ingest", post(handlers::ingest_telemetry))
        .route(
            "/namespaces",
            post(handlers::create_namespace).get(handlers::list_namespaces),
        )
        .route(
            "/namespaces/{name}",
            get(handlers::get_namespace).patch(handlers::update_namespace),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use axum::http::{header, Method, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_config() -> HubConfig {
        let mut config = HubConfig::default();
        config.health.check_dependencies = false;
        config
    }

    fn server_with(config: &HubConfig) -> (HttpServer, MemoryLog) {
        let log = MemoryLog::new(2);
        let server = HttpServer::new(config, Arc::new(log.clone()));
        (server, log)
    }

    async fn send(
        router: Router,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.oneshot(request).await.map_err(|err| match err {}).unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, value)
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let (server, _) = server_with(&test_config());
        let (status, headers, body) = send(server.router(), Method::GET, "/", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["service"], "Data Lineage Hub");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_lineage_ingest_tags_namespace() {
        let (server, log) = server_with(&test_config());
        let request = json!({
            "namespace": "team-x",
            "events": [{"eventType": "START", "run": {"runId": "r1"}, "job": {"name": "j1"}}]
        });

        let (status, _, body) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(request)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"accepted": 1, "rejected": 0, "errors": [], "namespace": "team-x"})
        );

        let messages = log.messages("openlineage-events");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].header("namespace"), Some("team-x"));
        let event: Value = serde_json::from_slice(&messages[0].value).unwrap();
        assert_eq!(event["job"]["namespace"], "team-x");
    }

    #[tokio::test]
    async fn test_routes_are_mounted_under_api_prefix() {
        let (server, _) = server_with(&test_config());
        let request = json!({"namespace": "team-x", "traces": [{"traceId": "t1"}]});

        let (status, _, body) = send(
            server.router(),
            Method::POST,
            "/api/v1/telemetry/ingest",
            None,
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["traces_accepted"], 1);

        let (status, _, body) =
            send(server.router(), Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_request_bounds_are_unprocessable() {
        let (server, log) = server_with(&test_config());

        let empty = json!({"namespace": "team-x", "events": []});
        let (status, _, _) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(empty)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let events: Vec<Value> = (0..101).map(|_| json!({"eventType": "START"})).collect();
        let too_many = json!({"namespace": "team-x", "events": events});
        let (status, _, _) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(too_many)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let short = json!({"namespace": "ab", "events": [{}]});
        let (status, _, body) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(short)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());

        assert!(log.messages("openlineage-events").is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (server, _) = server_with(&test_config());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/lineage/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auth_required_when_validation_enabled() {
        let mut config = test_config();
        config.auth.api_key_validation = true;
        let (server, _) = server_with(&config);

        let (status, headers, _) =
            send(server.router(), Method::GET, "/namespaces", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");

        let (status, _, _) =
            send(server.router(), Method::GET, "/namespaces", Some("wrong"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(server.router(), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) =
            send(server.router(), Method::GET, "/namespaces", Some("demo-api-key"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["namespaces"][0]["name"], "demo-pipeline");
    }

    #[tokio::test]
    async fn test_namespace_lifecycle() {
        let mut config = test_config();
        config.auth.api_key_validation = true;
        let (server, _) = server_with(&config);
        let owner = Some("team-data-platform-key");

        let create = json!({
            "name": "team-data",
            "display_name": "Team Data",
            "owners": ["admin@team-data-platform.com"],
            "daily_quota": 5000
        });
        let (status, _, body) =
            send(server.router(), Method::POST, "/namespaces", owner, Some(create.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["daily_event_quota"], 5000);

        let (status, _, _) =
            send(server.router(), Method::POST, "/namespaces", owner, Some(create)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, body) =
            send(server.router(), Method::GET, "/namespaces/team-data", owner, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Team Data");

        let (status, _, _) = send(
            server.router(),
            Method::GET,
            "/namespaces/team-data",
            Some("demo-api-key"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let patch = json!({"display_name": "Renamed", "retention_days": 90});
        let (status, _, body) = send(
            server.router(),
            Method::PATCH,
            "/api/v1/namespaces/team-data",
            owner,
            Some(patch),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["display_name"], "Renamed");
        assert_eq!(body["storage_retention_days"], 90);

        let (status, _, _) = send(
            server.router(),
            Method::PATCH,
            "/namespaces/team-data",
            Some("demo-api-key"),
            Some(json!({"display_name": "Hijack"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(
            server.router(),
            Method::PATCH,
            "/namespaces/team-data",
            owner,
            Some(json!({"daily_event_quota": "lots"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _, _) = send(
            server.router(),
            Method::PATCH,
            "/namespaces/team-data",
            owner,
            Some(json!({"daily_event_quota": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_namespace_is_not_found() {
        let (server, _) = server_with(&test_config());
        let (status, _, body) =
            send(server.router(), Method::GET, "/namespaces/no-such-ns", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("no-such-ns"));
    }

    #[tokio::test]
    async fn test_unknown_namespace_rejected_without_auto_create() {
        let mut config = test_config();
        config.namespaces.auto_create = false;
        let (server, log) = server_with(&config);
        let request = json!({"namespace": "unknown-ns", "events": [{"eventType": "START"}]});

        let (status, _, _) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(request)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(log.messages("openlineage-events").is_empty());
    }

    #[tokio::test]
    async fn test_missing_namespace_read_is_forbidden_without_auto_create() {
        let mut config = test_config();
        config.namespaces.auto_create = false;
        let (server, _) = server_with(&config);

        let (status, _, _) =
            send(server.router(), Method::GET, "/namespaces/no-such-ns", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = send(
            server.router(),
            Method::PATCH,
            "/namespaces/no-such-ns",
            None,
            Some(json!({"description": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_retry_after() {
        let mut config = test_config();
        config.rate_limit.requests_per_minute = 1;
        let (server, _) = server_with(&config);
        let request = json!({"namespace": "team-x", "events": [{"eventType": "START"}]});

        let (status, _, _) = send(
            server.router(),
            Method::POST,
            "/lineage/ingest",
            None,
            Some(request.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, headers, _) =
            send(server.router(), Method::POST, "/lineage/ingest", None, Some(request)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers[header::RETRY_AFTER], "60");
    }
}
