//! Route handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::gateway::{
    LineageIngestRequest, LineageIngestResponse, TelemetryIngestRequest, TelemetryIngestResponse,
};
use crate::health::HealthReport;
use crate::http::auth::Identity;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::namespace::{CreateNamespace, NamespaceConfig, NamespaceUpdate};

#[derive(Debug, Serialize)]
pub struct RootInfo {
    pub service: String,
    pub version: String,
    pub status: &'static str,
    pub docs_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct NamespaceList {
    pub namespaces: Vec<NamespaceConfig>,
    pub total: usize,
}

pub async fn root(State(state): State<AppState>) -> Json<RootInfo> {
    Json(RootInfo {
        service: state.service.name.clone(),
        version: state.service.version.clone(),
        status: "running",
        docs_url: "/docs",
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.check().await)
}

pub async fn ingest_lineage(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<LineageIngestRequest>, JsonRejection>,
) -> Result<Json<LineageIngestResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let LineageIngestRequest {
        namespace,
        events,
        source,
    } = request;

    state
        .gateway
        .admit(&namespace, identity.as_deref(), events.len())?;

    let response = state
        .gateway
        .ingest_lineage(&namespace, events, source.as_deref())
        .await;
    Ok(Json(response))
}

pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<TelemetryIngestRequest>, JsonRejection>,
) -> Result<Json<TelemetryIngestResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    state
        .gateway
        .admit(&request.namespace, identity.as_deref(), request.item_count())?;

    let TelemetryIngestRequest {
        namespace,
        traces,
        metrics,
        source,
    } = request;

    let response = state
        .gateway
        .ingest_telemetry(&namespace, traces, metrics, source.as_deref())
        .await;
    Ok(Json(response))
}

pub async fn create_namespace(
    State(state): State<AppState>,
    payload: Result<Json<CreateNamespace>, JsonRejection>,
) -> Result<Json<NamespaceConfig>, ApiError> {
    let Json(request) = payload?;
    let created = state.gateway.registry().create(request)?;
    Ok(Json(created.as_ref().clone()))
}

pub async fn list_namespaces(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<NamespaceList> {
    let namespaces: Vec<NamespaceConfig> = state
        .gateway
        .registry()
        .list(identity.as_deref())
        .into_iter()
        .map(|config| config.as_ref().clone())
        .collect();

    Json(NamespaceList {
        total: namespaces.len(),
        namespaces,
    })
}

pub async fn get_namespace(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
) -> Result<Json<NamespaceConfig>, ApiError> {
    state.gateway.authorize(&name, identity.as_deref(), false)?;

    state
        .gateway
        .registry()
        .get(&name)
        .map(|config| Json(config.as_ref().clone()))
        .ok_or_else(|| ApiError::NotFound(format!("Namespace '{}' not found", name)))
}

/// Owner-only partial update. The body is a free-form object: unknown keys
/// are ignored, known keys are type checked.
pub async fn update_namespace(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<NamespaceConfig>, ApiError> {
    let Json(body) = payload?;
    state.gateway.authorize(&name, identity.as_deref(), true)?;

    let Value::Object(fields) = body else {
        return Err(ApiError::Unprocessable(
            "Update body must be a JSON object".to_string(),
        ));
    };
    let update = NamespaceUpdate::from_json(&fields)?;

    match state.gateway.registry().update(&name, update)? {
        Some(updated) => {
            tracing::info!(namespace = %name, identity = ?identity.as_deref(), "Namespace updated");
            Ok(Json(updated.as_ref().clone()))
        }
        None => Err(ApiError::NotFound(format!("Namespace '{}' not found", name))),
    }
}
