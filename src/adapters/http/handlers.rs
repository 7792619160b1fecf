use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::{Value, json};

use crate::adapters::haproxy::HaproxyConfig;
use crate::adapters::redb_store::RedbStore;
use crate::core::entities::{Entity, Member};
use crate::core::error::{ErrorKind, ServiceError};
use crate::core::sync_service::SyncService;
use crate::utils::graceful_shutdown::{GracefulShutdown, ShutdownReason};

pub type AdminService = SyncService<RedbStore, HaproxyConfig>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdminService>,
    pub shutdown: Arc<GracefulShutdown>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/// A failed request, rendered as `{code, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: ErrorKind::BadData.as_str(),
            message,
        }
    }

    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: ErrorKind::NotFound.as_str(),
            message,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::BadData => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(kind = %kind, error = %err, "request failed");
        } else {
            tracing::debug!(kind = %kind, error = %err, "request rejected");
        }
        Self {
            status,
            code: kind.as_str(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>, kind: impl std::fmt::Display) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(format!("the {kind} data is invalid: {}", rejection.body_text())))
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let haproxy = state.service.renderer();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "haconfig": haproxy.config_path().display().to_string(),
        "hareload": haproxy.reload_command(),
        "shutting_down": state.shutdown.is_shutdown_initiated(),
        "store": state.service.store().path().display().to_string(),
    }))
}

pub async fn list<E: Entity>(State(state): State<AppState>) -> ApiResult<Json<Vec<E>>> {
    Ok(Json(state.service.get_all::<E>()?))
}

pub async fn get_one<E: Entity>(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<E>> {
    state
        .service
        .get::<E>(&name)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("the {} with name {name} does not exist", E::KIND)))
}

/// Create or replace; the entity's own name is used.
pub async fn put<E: Entity>(
    State(state): State<AppState>,
    payload: Result<Json<E>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<E>)> {
    let entity = parse_body(payload, E::KIND)?;
    store_entity(&state, entity).await
}

/// Create or replace under the name given in the path.
pub async fn put_named<E: Entity>(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<E>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<E>)> {
    let mut entity = parse_body(payload, E::KIND)?;
    entity.set_name(name);
    store_entity(&state, entity).await
}

async fn store_entity<E: Entity>(state: &AppState, entity: E) -> ApiResult<(StatusCode, Json<E>)> {
    let saved = state.service.save(entity).await?;
    let status = if saved.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(saved.entity)))
}

/// Partial update of an existing entity.
pub async fn post<E: Entity>(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<E>> {
    let patch = parse_body(payload, E::KIND)?;
    Ok(Json(state.service.merge::<E>(&name, patch).await?))
}

pub async fn delete<E: Entity>(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete::<E>(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn members(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<Member>>> {
    Ok(Json(state.service.members(&name)?))
}

pub async fn haproxy_config(State(state): State<AppState>) -> ApiResult<Response> {
    let text = state.service.read_config().await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

pub async fn reload(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.service.reload_proxy().await?;
    Ok(Json(json!({ "status": "reloaded" })))
}

pub async fn restart(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let accepted = state.shutdown.trigger_shutdown(ShutdownReason::Restart);
    let status = if accepted { "restarting" } else { "shutdown already in progress" };
    (StatusCode::ACCEPTED, Json(json!({ "status": status })))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::not_found("metrics are not enabled".to_string()).into_response(),
    }
}
