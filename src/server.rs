//! HTTP transport over the session controller.

use crate::controller::SessionController;
use crate::error::SessionError;
use crate::session::{SessionStatus, SessionSummary};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

const ENDPOINTS: &[&str] = &[
    "POST /api/sessions",
    "GET /api/sessions",
    "GET /api/sessions/{id}",
    "DELETE /api/sessions/{id}",
    "POST /api/sessions/{id}/moves",
    "GET /api/sessions/{id}/legal-moves",
    "POST /api/sessions/{id}/resign",
    "POST /api/sessions/{id}/reset",
    "GET /api/sessions/{id}/pgn",
    "GET /api/health",
    "POST /api/engine/restart",
    "GET /api/info",
];

/// Name, version and surface of the running service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Engine being launched.
    pub engine: String,
    /// Available routes.
    pub endpoints: Vec<String>,
}

/// Body of a move submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Coordinate move token, e.g. `e2e4`.
    #[serde(rename = "move")]
    pub token: String,
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    controller: Arc<SessionController>,
}

/// A session error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SessionError);

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::MalformedMove(_) | SessionError::IllegalMove { .. } => {
                StatusCode::BAD_REQUEST
            }
            SessionError::InvalidState(_) => StatusCode::CONFLICT,
            SessionError::ResourceExhausted(_) | SessionError::EngineUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SessionError::EngineFailure(_) => StatusCode::BAD_GATEWAY,
            SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self.0 {
            SessionError::Internal(detail) => {
                error!(detail = %detail, "Internal error");
                json!({ "success": false, "error": "internal error", "kind": self.0.kind() })
            }
            SessionError::IllegalMove { legal_moves, .. } => json!({
                "success": false,
                "error": self.0.to_string(),
                "kind": self.0.kind(),
                "legal_moves": legal_moves,
            }),
            other => {
                debug!(kind = other.kind(), error = %other, "Request rejected");
                json!({ "success": false, "error": other.to_string(), "kind": other.kind() })
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Serializes `payload` as an object and marks it successful.
fn success(payload: impl Serialize) -> ApiResult {
    let value = serde_json::to_value(payload)
        .map_err(|e| SessionError::Internal(format!("Failed to serialize response: {}", e)))?;
    let body = match value {
        Value::Object(mut map) => {
            map.insert("success".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "data": other }),
    };
    Ok(Json(body))
}

/// Builds the API router.
pub fn router(controller: Arc<SessionController>) -> Router {
    let state = AppState { controller };

    Router::new()
        .route("/api/sessions", post(create_session).get(list_sessions))
        .route("/api/sessions/{id}", get(get_state).delete(delete_session))
        .route("/api/sessions/{id}/moves", post(submit_move))
        .route("/api/sessions/{id}/legal-moves", get(legal_moves))
        .route("/api/sessions/{id}/resign", post(resign))
        .route("/api/sessions/{id}/reset", post(reset))
        .route("/api/sessions/{id}/pgn", get(export_pgn))
        .route("/api/health", get(health))
        .route("/api/engine/restart", post(restart_engine))
        .route("/api/info", get(service_info))
        .with_state(state)
}

/// Serves the API on `host:port` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
#[instrument(skip(controller, shutdown))]
pub async fn serve(
    controller: Arc<SessionController>,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("Chess server listening on http://{}:{}/", host, port);
    axum::serve(listener, router(controller))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Chess server stopped");
    Ok(())
}

async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), ApiError> {
    let view = state.controller.create_session()?;
    Ok((StatusCode::CREATED, success(view)?))
}

async fn list_sessions(State(state): State<AppState>) -> ApiResult {
    let sessions: Vec<SessionSummary> = state.controller.list_sessions().collect();
    success(json!({ "count": sessions.len(), "sessions": sessions }))
}

async fn get_state(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    success(state.controller.get_state(&id)?)
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.controller.delete(&id);
    success(json!({ "session_id": id }))
}

async fn submit_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> ApiResult {
    let view = state.controller.submit_move(&id, &request.token)?;
    let engine_thinking = view.status == SessionStatus::EngineThinking;
    success(json!({ "engine_thinking": engine_thinking, "session": view }))
}

async fn legal_moves(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let moves = state.controller.list_legal_moves(&id)?;
    success(json!({ "count": moves.len(), "legal_moves": moves }))
}

async fn resign(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    success(state.controller.resign(&id)?)
}

async fn reset(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    success(state.controller.reset(&id)?)
}

async fn export_pgn(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let pgn = state.controller.export_pgn(&id)?;
    success(json!({ "session_id": id, "pgn": pgn }))
}

async fn health(State(state): State<AppState>) -> ApiResult {
    success(state.controller.health())
}

async fn restart_engine(State(state): State<AppState>) -> ApiResult {
    state.controller.restart_engine().await?;
    success(json!({ "engine_available": state.controller.engine().is_available() }))
}

async fn service_info(State(state): State<AppState>) -> ApiResult {
    success(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.controller.engine().describe(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}
