use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::conversation::{self, TurnOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    /// Also synthesize the reply as base64 MP3.
    #[serde(default)]
    pub speak: bool,
}

#[derive(Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Text entry point to the same turn pipeline the voice socket uses.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session_id = payload.session_id.trim();
    let message = payload.message.trim();
    if session_id.is_empty() || message.is_empty() {
        return Err(AppError::BadRequest(
            "session_id and message are required".to_string(),
        ));
    }

    let outcome = conversation::process_turn(&state, session_id, message).await?;

    let audio = if payload.speak {
        match state.tts.synthesize(&outcome.reply).await {
            Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "speech synthesis failed, replying with text only");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ChatResponse { outcome, audio }))
}
