//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`            — Send a message, get the gated reply
//! - `DELETE /v1/sessions/{id}`   — End a session, cancelling any turn in flight

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use careerchat_core::error::Error;
use careerchat_core::message::SessionId;

use crate::SharedState;

/// Build the v1 router (mounted under `/v1`).
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/sessions/{id}", delete(end_session_handler))
        .with_state(state)
}

// ── Request/Response types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omit to start a new session
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub forced_accept: bool,
    pub degraded: bool,
    pub attempts: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .map(|id| SessionId::from(id.trim()))
        .unwrap_or_default();

    info!(session_id = %session_id, chars = payload.message.len(), "v1/chat request");

    match state.service.handle_turn(&session_id, &payload.message).await {
        Ok(reply) => Ok(Json(ChatResponse {
            session_id: session_id.0,
            reply: reply.reply_text,
            forced_accept: reply.forced_accept,
            degraded: reply.degraded,
            attempts: reply.attempts,
        })),
        Err(Error::InvalidInput(reason)) => Err(api_error(StatusCode::BAD_REQUEST, reason)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Chat turn failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))
        }
    }
}

async fn end_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service.end_session(&SessionId::from(&id)).await {
        info!(session_id = %id, "Session ended by client");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, format!("session '{id}' not found")))
    }
}
