//! Supervisor-facing HTTP API for the handoff agent.
//!
//! Supervisors poll the escalation records the agent writes, fetch a join
//! token for a room that asked for help, and mark the request resolved once
//! they have handled it.
//!
//! The `handoff-server` binary serves this API only. Agent sessions need a
//! [`ReasoningEngine`], which the binary does not carry; a host that has one
//! embeds [`app`] and calls [`AppState::agent_worker`] so its sessions write
//! to the store the API reads.

pub mod api;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use handoff_escalation::EscalationStore;
use handoff_voice::{AgentConfig, ReasoningEngine, VoiceError, VoiceService, Worker};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Escalation records, shared with any agent worker in this process.
    pub store: Arc<dyn EscalationStore>,
    /// Issues supervisor join tokens.
    pub voice_service: Arc<VoiceService>,
    /// Validated settings for [`AppState::agent_worker`].
    pub agent: AgentConfig,
}

impl AppState {
    /// Prewarms an agent worker that writes to the same store the API reads.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if the agent settings are invalid.
    pub fn agent_worker(&self, engine: Arc<dyn ReasoningEngine>) -> Result<Worker, VoiceError> {
        Worker::prewarm(self.agent.clone(), Arc::clone(&self.store), engine)
    }
}

/// Maximum request body size (64 KiB). Every request body here is a small
/// JSON object.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/escalations", get(api::list_escalations_handler))
        .route(
            "/api/escalations/{roomId}",
            get(api::get_escalation_handler),
        )
        .route(
            "/api/escalations/{roomId}/resolve",
            post(api::resolve_escalation_handler),
        )
        .route(
            "/api/escalations/{roomId}/join",
            post(api::join_room_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
