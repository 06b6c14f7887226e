use super::state::AppState;
use crate::error::AgentError;
use crate::session::{AgentStatus, TranscriptTurn};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub status: AgentStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: AgentStatus,
    pub error: Option<String>,
    pub waving: bool,
    pub authenticated: bool,
    pub has_secret: bool,
    pub turns: usize,
}

#[derive(Debug, Deserialize)]
pub struct SaveSecretRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        code,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Open a voice session; the status moves on asynchronously
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Start requested over HTTP");

    match state.agent.start().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(SessionResponse {
                status: state.agent.status(),
                message: "Session starting".to_string(),
            }),
        )
            .into_response(),
        Err(e) => match e.downcast_ref::<AgentError>() {
            Some(AgentError::SessionActive) => error_response(StatusCode::CONFLICT, e.to_string()),
            Some(agent_error @ AgentError::ConfigurationMissing(_)) => {
                warn!("Start rejected: {}", agent_error);
                error_response(StatusCode::PRECONDITION_FAILED, agent_error.user_message())
            }
            Some(agent_error) => {
                error!("Start failed: {}", agent_error);
                error_response(StatusCode::BAD_GATEWAY, agent_error.user_message())
            }
            None => {
                error!("Start failed: {}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        },
    }
}

/// POST /session/stop
/// Tear the session down; responds after every device is released
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stop requested over HTTP");

    match state.agent.stop().await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionResponse {
                status: state.agent.status(),
                message: "Session stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Stop failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.agent.snapshot();
    Json(StatusResponse {
        status: snapshot.status,
        error: snapshot.error,
        waving: snapshot.waving,
        authenticated: snapshot.authenticated,
        has_secret: snapshot.has_secret,
        turns: snapshot.transcript.len(),
    })
}

/// GET /session/transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript: Vec<TranscriptTurn> = state.agent.snapshot().transcript;
    Json(transcript)
}

/// PUT /config/secret
pub async fn save_secret(
    State(state): State<AppState>,
    Json(req): Json<SaveSecretRequest>,
) -> impl IntoResponse {
    match state.agent.save_secret(req.password).await {
        Ok(()) => (StatusCode::NO_CONTENT, ()).into_response(),
        Err(e) => {
            warn!("Secret not saved: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
