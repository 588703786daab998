use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::engine::{RouterResponse, SubQuestionEngine};
use crate::state::AppState;
use crate::transcript::{Role, TranscriptStore};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub session_id: String,
    pub message: String,
}

/// One conversational turn: record the user message, run the router, record
/// the reply. A blank message is rejected before anything is recorded or
/// queried. A failed query leaves the user turn in place.
pub async fn run_chat_turn(
    engine: &SubQuestionEngine,
    transcripts: &TranscriptStore,
    session_id: &str,
    message: &str,
) -> Result<RouterResponse, ApiError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    transcripts.append(session_id, Role::User, message);
    let response = engine.query(message).await?;
    transcripts.append(session_id, Role::Assistant, &response.answer);

    Ok(response)
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id must not be empty".to_string()));
    }

    let response = run_chat_turn(
        &state.router_engine,
        &state.transcripts,
        session_id,
        &payload.message,
    )
    .await?;

    Ok(Json(response))
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.transcripts.turns(&session_id);
    Ok(Json(json!({ "messages": messages })))
}
