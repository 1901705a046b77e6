//! Axum route handlers for the control-plane HTTP API.
//!
//! # Routes
//!
//! - `GET  /health`:           Returns `{"status": "ok", "version": "..."}`
//! - `GET  /traits`:           `TraitMeta` rows, optional `?workload=` filter
//! - `GET  /workloads`:        `WorkloadMeta` rows
//! - `GET  /workloads/:name`:  One workload definition
//! - `POST /workloads`:        Accepts `RunRequest`, returns `RunResponse`
//! - `GET  /envs`:             Configured environments
//! - `GET  /envs/:name`:       One environment

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::capabilities::{CapabilityDefinition, CapabilityKind};
use crate::env::EnvironmentContext;
use crate::error::{ErrorKind, PlaneError, ValidationError};
use crate::matcher::{TraitMeta, WorkloadMeta};
use crate::plane::{ControlPlane, RunRequest, RunResponse};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub plane: Arc<ControlPlane>,
}

impl AppState {
    pub fn new(plane: ControlPlane) -> Self {
        Self {
            plane: Arc::new(plane),
        }
    }
}

/// A [`PlaneError`] on its way out as an HTTP response.
pub struct ApiError(PlaneError);

impl From<PlaneError> for ApiError {
    fn from(err: PlaneError) -> Self {
        Self(err)
    }
}

/// A body that does not decode is a validation failure of the request body.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ValidationError::new(REQUEST_BODY_PARAM, rejection.body_text()).into())
    }
}

/// Name reported as the offending parameter when the body itself is invalid.
pub const REQUEST_BODY_PARAM: &str = "body";

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::RegistryFetchError => StatusCode::BAD_GATEWAY,
        ErrorKind::CancelledError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::KindMismatchError | ErrorKind::ApplyError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.0.to_body();
        let status = status_for(body.kind);
        if status.is_server_error() {
            tracing::error!(kind = ?body.kind, "{}", body.message);
        } else {
            tracing::debug!(kind = ?body.kind, "{}", body.message);
        }
        (status, Json(body)).into_response()
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/traits", get(list_traits_handler))
        .route(
            "/workloads",
            get(list_workloads_handler).post(run_workload_handler),
        )
        .route("/workloads/:name", get(get_workload_handler))
        .route("/envs", get(list_envs_handler))
        .route("/envs/:name", get(get_env_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "capplane",
    }))
}

#[derive(Debug, Default, Deserialize)]
struct TraitsQuery {
    #[serde(default)]
    workload: String,
}

/// GET /traits: list traits, optionally filtered by workload type.
async fn list_traits_handler(
    State(state): State<AppState>,
    Query(query): Query<TraitsQuery>,
) -> Result<Json<Vec<TraitMeta>>, ApiError> {
    Ok(Json(state.plane.list_traits(&query.workload).await?))
}

/// GET /workloads: list workload types.
async fn list_workloads_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkloadMeta>>, ApiError> {
    Ok(Json(state.plane.list_workloads().await?))
}

/// GET /workloads/:name: one workload type by name or short alias.
async fn get_workload_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CapabilityDefinition>, ApiError> {
    Ok(Json(
        state
            .plane
            .get_capability(CapabilityKind::Workload, &name)
            .await?,
    ))
}

/// POST /workloads: stage or apply a workload.
///
/// Request:  `RunRequest` = `{ "envName", "workloadName", "workloadType", "appGroup", "staging", "flags": [{name, value}] }`
/// Response: `RunResponse`
async fn run_workload_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.plane.run(request).await?))
}

/// GET /envs: configured environments.
async fn list_envs_handler(State(state): State<AppState>) -> Json<Vec<EnvironmentContext>> {
    Json(state.plane.environments().to_vec())
}

/// GET /envs/:name: one environment.
async fn get_env_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EnvironmentContext>, ApiError> {
    Ok(Json(state.plane.environment(&name)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
