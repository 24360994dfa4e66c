use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::{self, queries};
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    // Strip .ics suffix if present
    let appointment_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let lookup = db::lock(&state.db)
        .and_then(|conn| queries::get_appointment_by_id(&conn, appointment_id));
    let appointment = match lookup {
        Ok(Some(a)) => a,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Appointment not found").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load appointment for .ics");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
        }
    };

    let ics = generate_ics(&appointment, &state.salon.name);
    let filename = format!("appointment-{appointment_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
