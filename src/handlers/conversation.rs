use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{BookingRecord, Field, SessionStatus, Turn};
use crate::services::conversation;
use crate::services::memory::ConversationMemory;
use crate::state::AppState;

// GET /conversation/history/:user_id
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Turn>>, AppError> {
    Ok(Json(state.memory.history(&user_id)?))
}

#[derive(Deserialize)]
pub struct RecordQuery {
    /// Re-run extraction over the recent turns instead of returning the
    /// stored record.
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Serialize)]
pub struct RecordResponse {
    pub record: BookingRecord,
    pub missing_fields: Vec<Field>,
    pub status: SessionStatus,
    pub appointment_id: Option<String>,
}

// GET /conversation/record/:user_id
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<RecordResponse>, AppError> {
    let session = {
        let conn = db::lock(&state.db)?;
        queries::get_session(&conn, &user_id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("session {user_id}")))?;

    let record = if query.refresh {
        conversation::accumulate(&state, &user_id).await?
    } else {
        session.record
    };

    let missing_fields = if session.status == SessionStatus::Booked {
        vec![]
    } else {
        state
            .extraction
            .gate()
            .missing_fields(&record)
            .into_iter()
            .collect()
    };

    Ok(Json(RecordResponse {
        record,
        missing_fields,
        status: session.status,
        appointment_id: session.appointment_id,
    }))
}
