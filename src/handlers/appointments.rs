use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::NaiveTime;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Appointment, DateToken};
use crate::services::extraction::email;
use crate::services::scheduling::{AppointmentScheduler, BookingRequest, SchedulingError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

// GET /appointments
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let conn = db::lock(&state.db)?;
    Ok(Json(queries::list_appointments(&conn, limit)?))
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub session_id: Option<String>,
    pub customer_name: Option<String>,
    pub service: String,
    pub stylist: String,
    /// `YYYY-MM-DD`, a weekday name, `today` or `tomorrow`.
    pub date: DateToken,
    /// `15:00`, `3:00 PM` or `3pm`.
    pub time: String,
    pub email: String,
}

/// Accepts 24-hour `H:MM` and 12-hour times with an AM/PM suffix.
fn parse_time_input(raw: &str) -> Option<NaiveTime> {
    let compact = raw.trim().to_uppercase().replace(' ', "");
    let (clock, meridiem) = match compact.strip_suffix("AM") {
        Some(clock) => (clock, Some("AM")),
        None => match compact.strip_suffix("PM") {
            Some(clock) => (clock, Some("PM")),
            None => (compact.as_str(), None),
        },
    };

    match meridiem {
        Some(meridiem) => {
            let clock = if clock.contains(':') {
                clock.to_string()
            } else {
                format!("{clock}:00")
            };
            NaiveTime::parse_from_str(&format!("{clock} {meridiem}"), "%I:%M %p").ok()
        }
        None => NaiveTime::parse_from_str(clock, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S"))
            .ok(),
    }
}

fn canonical<'a>(names: impl Iterator<Item = &'a String>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    names
        .into_iter()
        .find(|n| n.eq_ignore_ascii_case(raw))
        .cloned()
}

// POST /appointments/schedule
pub async fn schedule_appointment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = canonical(state.salon.services.iter().map(|s| &s.name), &payload.service)
        .ok_or_else(|| AppError::BadRequest(format!("unknown service: {}", payload.service)))?;
    let stylist = canonical(state.salon.stylists.iter().map(|s| &s.name), &payload.stylist)
        .ok_or_else(|| AppError::BadRequest(format!("unknown stylist: {}", payload.stylist)))?;
    let time = parse_time_input(&payload.time)
        .ok_or_else(|| AppError::BadRequest(format!("invalid time: {}", payload.time)))?;
    let email = email::repair(&payload.email)
        .ok_or_else(|| AppError::BadRequest(format!("invalid email: {}", payload.email)))?;

    let request = BookingRequest {
        session_id: payload.session_id.filter(|s| !s.trim().is_empty()),
        customer_name: payload
            .customer_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        service,
        stylist,
        date: payload.date,
        time,
        email,
    };

    let scheduler = AppointmentScheduler::new(
        &state.db,
        &state.salon,
        state.mailer.as_ref(),
        &state.booking_tx,
    );
    match scheduler.schedule(request).await {
        Ok(appointment) => Ok((StatusCode::CREATED, Json(appointment))),
        Err(SchedulingError::Storage(e)) => Err(AppError::Internal(e)),
        Err(e) => Err(AppError::Unprocessable(e.to_string())),
    }
}

// GET /appointments/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.booking_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("appointment_booked")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "booking event subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_time_input() {
        assert_eq!(parse_time_input("15:00"), Some(t(15, 0)));
        assert_eq!(parse_time_input("3:30 PM"), Some(t(15, 30)));
        assert_eq!(parse_time_input("3pm"), Some(t(15, 0)));
        assert_eq!(parse_time_input("11 am"), Some(t(11, 0)));
        assert_eq!(parse_time_input("12 PM"), Some(t(12, 0)));
        assert_eq!(parse_time_input("noonish"), None);
        assert_eq!(parse_time_input("25:00"), None);
    }
}
