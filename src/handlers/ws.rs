use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::json;

use crate::services::ai::receptionist::FALLBACK_REPLY;
use crate::services::conversation::{self, TurnOutcome};
use crate::state::AppState;

// GET /ws/:client_id
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}

/// Sends the reply as text, then as audio when synthesis works.
async fn speak(socket: &mut WebSocket, state: &AppState, text: &str) -> Result<(), axum::Error> {
    send_json(socket, json!({ "type": "text", "text": text })).await?;
    match state.tts.synthesize(text).await {
        Ok(audio) if !audio.is_empty() => socket.send(Message::Binary(audio)).await,
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis failed, sent text only");
            Ok(())
        }
    }
}

async fn send_outcome(
    socket: &mut WebSocket,
    state: &AppState,
    outcome: &TurnOutcome,
) -> Result<(), axum::Error> {
    speak(socket, state, &outcome.reply).await?;
    send_json(
        socket,
        json!({
            "type": "record",
            "record": outcome.record,
            "missing_fields": outcome.missing_fields,
            "status": outcome.status,
        }),
    )
    .await?;
    if let Some(appointment) = &outcome.appointment {
        send_json(
            socket,
            json!({ "type": "appointment_confirmed", "appointment": appointment }),
        )
        .await?;
    }
    Ok(())
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, client_id: String) {
    tracing::info!(session = %client_id, "client connected");

    match conversation::open_session(&state, &client_id).await {
        Ok(Some(greeting)) => {
            if speak(&mut socket, &state, &greeting).await.is_err() {
                return;
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(session = %client_id, error = %e, "failed to open session");
            return;
        }
    }

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(session = %client_id, error = %e, "websocket receive failed");
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Binary(audio) => match state.stt.transcribe(audio).await {
                Ok(Some(text)) => {
                    if send_json(&mut socket, json!({ "type": "transcript", "text": text }))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    text
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(session = %client_id, error = %e, "transcription failed");
                    if speak(&mut socket, &state, FALLBACK_REPLY).await.is_err() {
                        break;
                    }
                    continue;
                }
            },
            Message::Close(_) => break,
            _ => continue,
        };

        if text.trim().is_empty() {
            continue;
        }

        let sent = match conversation::process_turn(&state, &client_id, &text).await {
            Ok(outcome) => send_outcome(&mut socket, &state, &outcome).await,
            Err(e) => {
                tracing::error!(session = %client_id, error = %e, "failed to process turn");
                speak(&mut socket, &state, FALLBACK_REPLY).await
            }
        };
        if sent.is_err() {
            break;
        }
    }

    tracing::info!(session = %client_id, "client disconnected");
}
