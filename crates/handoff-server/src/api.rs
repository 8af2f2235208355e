//! Escalation handlers for supervisors.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use handoff_escalation::EscalationError;
use handoff_types::{normalize_text, EscalationRecord, RequestState};
use handoff_voice::VoiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Query parameters for `GET /api/escalations`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// `NONE`, `PENDING` or `RESOLVED`. All records when absent.
    pub state: Option<String>,
}

/// Response body for `GET /api/escalations`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub escalations: Vec<EscalationRecord>,
}

/// Request body for `POST /api/escalations/{roomId}/join`.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Display name of the supervisor.
    pub name: String,
}

/// Response body for a successful join.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_id: String,
    /// Identity the token is bound to; always carries the supervisor suffix.
    pub identity: String,
    pub token: String,
    /// LiveKit URL to connect to.
    pub url: String,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => {
                tracing::error!("request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<EscalationError> for ApiError {
    fn from(e: EscalationError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::Config(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

async fn require_record(state: &AppState, room_id: &str) -> Result<EscalationRecord, ApiError> {
    state
        .store
        .get(room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no escalation for room: {room_id}")))
}

/// Handler for `GET /api/escalations`.
pub async fn list_escalations_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let filter = query
        .state
        .as_deref()
        .map(str::parse::<RequestState>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let escalations = state.store.list(filter).await?;
    Ok(Json(ListResponse { escalations }))
}

/// Handler for `GET /api/escalations/{roomId}`.
pub async fn get_escalation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<EscalationRecord>, ApiError> {
    Ok(Json(require_record(&state, &room_id).await?))
}

/// Handler for `POST /api/escalations/{roomId}/resolve`.
///
/// Only a PENDING request can be resolved.
pub async fn resolve_escalation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<EscalationRecord>, ApiError> {
    let record = require_record(&state, &room_id).await?;
    if !record.is_pending() {
        return Err(ApiError::Conflict(format!(
            "escalation for room {room_id} is {}, not PENDING",
            record.request_state
        )));
    }

    let resolved = state
        .store
        .resolve(&room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no escalation for room: {room_id}")))?;

    tracing::info!(room = %room_id, "escalation resolved");
    Ok(Json(resolved))
}

/// Handler for `POST /api/escalations/{roomId}/join`.
///
/// Mints a token whose identity ends in `-supervisor`, so the agent in the
/// room stops answering once the supervisor is present.
pub async fn join_room_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(payload): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let Some(name) = normalize_text(Some(payload.name.as_str())) else {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    };

    if !state.voice_service.is_enabled() {
        return Err(ApiError::ServiceUnavailable(
            "LiveKit is not configured; set livekit.url, livekit.api_key and livekit.api_secret"
                .to_string(),
        ));
    }

    require_record(&state, &room_id).await?;

    let (identity, token) = state.voice_service.generate_supervisor_token(&room_id, &name)?;
    tracing::info!(room = %room_id, identity = %identity, "issued supervisor join token");

    Ok(Json(JoinResponse {
        room_id,
        identity,
        token,
        url: state.voice_service.url().to_string(),
    }))
}
