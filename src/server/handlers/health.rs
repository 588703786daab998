use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::llm::MISSING_CREDENTIAL_WARNING;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Operational snapshot for the pages: credential state plus one entry per
/// query-engine tool, including whether its vector index has been built yet.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let credential_warning = if state.has_credential {
        None
    } else {
        Some(MISSING_CREDENTIAL_WARNING)
    };

    let tools: Vec<_> = state
        .router_engine
        .tools()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.metadata.name,
                "description": tool.metadata.description,
                "document_id": tool.engine.document_id(),
                "source": tool.engine.source(),
                "chunks": tool.engine.chunk_count(),
                "index_ready": tool.engine.is_ready(),
            })
        })
        .collect();

    Json(json!({
        "credential_present": state.has_credential,
        "credential_warning": credential_warning,
        "documents": tools.len(),
        "tools": tools,
        "active_sessions": state.transcripts.session_count(),
    }))
}
