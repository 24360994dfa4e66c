pub mod appointments;
pub mod calendar;
pub mod chat;
pub mod conversation;
pub mod health;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ws/:client_id", get(ws::ws_handler))
        .route("/api/chat", post(chat::chat))
        .route(
            "/conversation/history/:user_id",
            get(conversation::get_history),
        )
        .route(
            "/conversation/record/:user_id",
            get(conversation::get_record),
        )
        .route("/appointments", get(appointments::list_appointments))
        .route(
            "/appointments/schedule",
            post(appointments::schedule_appointment),
        )
        .route("/appointments/events", get(appointments::events_stream))
        .route(
            "/calendar/:appointment_id",
            get(calendar::download_ics),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
