use chrono::Utc;
use serde::Serialize;

use crate::db::{self, queries};
use crate::models::{Appointment, BookingRecord, Field, Session, SessionStatus, Turn};
use crate::services::ai::extraction::LlmFieldExtractor;
use crate::services::ai::receptionist::{self, BookingNote};
use crate::services::extraction::FieldExtractionProvider;
use crate::services::memory::ConversationMemory;
use crate::services::scheduling::{AppointmentScheduler, BookingHandler, SchedulingError};
use crate::state::AppState;

/// Everything a transport needs to answer one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub record: BookingRecord,
    pub missing_fields: Vec<Field>,
    pub status: SessionStatus,
    pub appointment: Option<Appointment>,
}

fn load_or_create(state: &AppState, session_id: &str) -> anyhow::Result<(Session, bool)> {
    let db = db::lock(&state.db)?;
    match queries::get_session(&db, session_id)? {
        Some(session) => Ok((session, false)),
        None => {
            let session = Session::new(session_id);
            queries::upsert_session(&db, &session)?;
            Ok((session, true))
        }
    }
}

/// Starts a session on first connect. Returns the greeting when the
/// session is new; reconnecting clients get `None`.
pub async fn open_session(state: &AppState, session_id: &str) -> anyhow::Result<Option<String>> {
    let _guard = state.sessions.acquire(session_id).await;

    let (_, created) = load_or_create(state, session_id)?;
    if !created {
        return Ok(None);
    }

    let greeting = receptionist::greeting(&state.salon);
    state.memory.append_turn(session_id, &Turn::assistant(&greeting))?;
    tracing::info!(session = %session_id, "session opened");
    Ok(Some(greeting))
}

/// Re-runs extraction over the session's recent turns.
pub async fn accumulate(state: &AppState, session_id: &str) -> anyhow::Result<BookingRecord> {
    let session = {
        let db = db::lock(&state.db)?;
        queries::get_session(&db, session_id)?
    }
    .unwrap_or_else(|| Session::new(session_id));

    let llm = llm_extractor(state);
    state
        .extraction
        .accumulate_session(&state.memory, &session, llm.as_ref().map(as_provider))
        .await
}

fn llm_extractor(state: &AppState) -> Option<LlmFieldExtractor<'_>> {
    state
        .config
        .llm_extraction
        .then(|| LlmFieldExtractor::new(state.llm.as_ref(), &state.salon))
}

fn as_provider<'a>(e: &'a LlmFieldExtractor<'_>) -> &'a dyn FieldExtractionProvider {
    e
}

/// Handles one user utterance: record it, update the booking record, book
/// when the record has just become complete, and produce the reply.
/// Turns of one session are serialized; different sessions run in parallel.
pub async fn process_turn(
    state: &AppState,
    session_id: &str,
    text: &str,
) -> anyhow::Result<TurnOutcome> {
    let text = text.trim();
    anyhow::ensure!(!text.is_empty(), "empty utterance");

    let _guard = state.sessions.acquire(session_id).await;

    let (mut session, _) = load_or_create(state, session_id)?;
    state.memory.append_turn(session_id, &Turn::user(text))?;

    let gate = state.extraction.gate();
    let previous = session.record.clone();
    let llm = llm_extractor(state);
    session.record = state
        .extraction
        .accumulate_session(&state.memory, &session, llm.as_ref().map(as_provider))
        .await?;

    let missing = gate.missing_fields(&session.record);
    // Book on the transition to complete, or when a complete record was
    // edited after a rejected attempt. Never for an already booked session.
    let should_book = !session.is_booked()
        && missing.is_empty()
        && (!gate.is_complete(&previous) || previous != session.record);

    let mut appointment = None;
    let note = if session.is_booked() {
        BookingNote::AlreadyBooked
    } else if should_book {
        let scheduler = AppointmentScheduler::new(
            &state.db,
            &state.salon,
            state.mailer.as_ref(),
            &state.booking_tx,
        );
        match scheduler.book(session_id, &session.record).await {
            Ok(booked) => {
                session.status = SessionStatus::Booked;
                session.appointment_id = Some(booked.id.clone());
                session.updated_at = Utc::now().naive_utc();
                // Persist now; the turn may be cancelled while the reply is generated.
                {
                    let db = db::lock(&state.db)?;
                    queries::upsert_session(&db, &session)?;
                }
                appointment = Some(booked.clone());
                BookingNote::Confirmed(booked)
            }
            Err(SchedulingError::Storage(e)) => {
                tracing::error!(session = %session_id, error = %e, "failed to store appointment");
                BookingNote::Rejected("our booking system is unavailable right now".to_string())
            }
            Err(e) => {
                tracing::info!(session = %session_id, reason = %e, "booking rejected");
                BookingNote::Rejected(e.to_string())
            }
        }
    } else {
        BookingNote::None
    };

    let window = state
        .memory
        .recent_turns(session_id, state.salon.context_window)?;
    let prompt = receptionist::system_prompt(&state.salon, &session.record, &missing, &note);
    let reply = receptionist::reply(state.llm.as_ref(), &prompt, &window).await;

    state.memory.append_turn(session_id, &Turn::assistant(&reply))?;
    session.updated_at = Utc::now().naive_utc();
    {
        let db = db::lock(&state.db)?;
        queries::upsert_session(&db, &session)?;
    }

    tracing::info!(
        session = %session_id,
        missing = ?missing,
        status = session.status.as_str(),
        "turn processed"
    );

    Ok(TurnOutcome {
        reply,
        missing_fields: if session.is_booked() {
            vec![]
        } else {
            missing.into_iter().collect()
        },
        record: session.record,
        status: session.status,
        appointment,
    })
}
