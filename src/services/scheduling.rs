use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::SalonConfig;
use crate::db::{self, queries};
use crate::models::{
    record::weekday_name, Appointment, AppointmentStatus, BookingEvent, BookingRecord,
    BusinessHours, DateToken, Field,
};
use crate::services::calendar::generate_ics;
use crate::services::mail::{confirmation_email, Mailer};

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("the booking is missing: {0}")]
    Incomplete(String),
    #[error("that date could not be worked out")]
    UnresolvableDate,
    #[error("that date has already passed")]
    PastDate,
    #[error("that time has already passed today")]
    PastTime,
    #[error("that time is outside our business hours. We're available: {hours}")]
    OutsideBusinessHours { hours: String },
    #[error("we're closed on {day}. We're available: {hours}")]
    ClosedDay { day: String, hours: String },
    #[error("{stylist} is already booked at that time")]
    Conflict { stylist: String },
    #[error("the booking could not be stored")]
    Storage(#[from] anyhow::Error),
}

/// A complete booking, ready to be scheduled.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub service: String,
    pub stylist: String,
    pub date: DateToken,
    pub time: NaiveTime,
    pub email: String,
}

impl BookingRequest {
    pub fn from_record(session_id: &str, record: &BookingRecord) -> Result<Self, SchedulingError> {
        match (&record.service, &record.stylist, record.date, record.time, &record.email) {
            (Some(service), Some(stylist), Some(date), Some(time), Some(email)) => Ok(Self {
                session_id: Some(session_id.to_string()),
                customer_name: record.customer_name.clone(),
                service: service.clone(),
                stylist: stylist.clone(),
                date,
                time,
                email: email.clone(),
            }),
            _ => {
                let missing = [Field::Service, Field::Stylist, Field::Date, Field::Time, Field::Email]
                    .into_iter()
                    .filter(|f| !record.is_set(*f))
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(SchedulingError::Incomplete(missing))
            }
        }
    }
}

/// Called once when a session's record first becomes complete.
#[async_trait]
pub trait BookingHandler: Send + Sync {
    async fn book(
        &self,
        session_id: &str,
        record: &BookingRecord,
    ) -> Result<Appointment, SchedulingError>;
}

pub fn validate_booking_time(
    conn: &Connection,
    stylist: &str,
    date: NaiveDate,
    time: NaiveTime,
    duration_minutes: i32,
    hours: &BusinessHours,
) -> Result<(), SchedulingError> {
    let weekday = date.weekday();
    if !hours.is_open_on(weekday) {
        return Err(SchedulingError::ClosedDay {
            day: weekday_name(weekday).to_string(),
            hours: hours.to_human_readable(),
        });
    }
    if !hours.is_within(time) || !hours.end_within(time, duration_minutes) {
        return Err(SchedulingError::OutsideBusinessHours {
            hours: hours.to_human_readable(),
        });
    }

    // Check for conflicts with the stylist's other appointments that day
    let existing = queries::appointments_for_stylist_on(conn, stylist, date)?;
    let proposed_start = date.and_time(time);
    let proposed_end = proposed_start + Duration::minutes(duration_minutes as i64);

    for appointment in &existing {
        // Overlap: starts before proposed ends AND ends after proposed starts
        if appointment.starts_at() < proposed_end && appointment.ends_at() > proposed_start {
            return Err(SchedulingError::Conflict {
                stylist: stylist.to_string(),
            });
        }
    }

    Ok(())
}

/// Stores appointments, announces them, and mails the confirmation.
pub struct AppointmentScheduler<'a> {
    db: &'a Arc<Mutex<Connection>>,
    salon: &'a SalonConfig,
    mailer: &'a dyn Mailer,
    events: &'a broadcast::Sender<BookingEvent>,
}

impl<'a> AppointmentScheduler<'a> {
    pub fn new(
        db: &'a Arc<Mutex<Connection>>,
        salon: &'a SalonConfig,
        mailer: &'a dyn Mailer,
        events: &'a broadcast::Sender<BookingEvent>,
    ) -> Self {
        Self {
            db,
            salon,
            mailer,
            events,
        }
    }

    pub async fn schedule(&self, request: BookingRequest) -> Result<Appointment, SchedulingError> {
        self.schedule_on(request, Local::now().naive_local()).await
    }

    /// Schedules with relative dates resolved against the day of `now`.
    pub async fn schedule_on(
        &self,
        request: BookingRequest,
        now: NaiveDateTime,
    ) -> Result<Appointment, SchedulingError> {
        let today = now.date();
        let date = request
            .date
            .resolve(today)
            .ok_or(SchedulingError::UnresolvableDate)?;
        if date < today {
            return Err(SchedulingError::PastDate);
        }
        if date.and_time(request.time) < now {
            return Err(SchedulingError::PastTime);
        }

        let now = Utc::now().naive_utc();
        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: request.session_id,
            customer_name: request.customer_name,
            service: request.service,
            stylist: request.stylist,
            date,
            time: request.time,
            duration_minutes: self.salon.appointment_minutes,
            email: request.email,
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        {
            let conn = db::lock(self.db)?;
            validate_booking_time(
                &conn,
                &appointment.stylist,
                appointment.date,
                appointment.time,
                appointment.duration_minutes,
                &self.salon.hours,
            )?;
            queries::create_appointment(&conn, &appointment)?;
        }

        tracing::info!(
            appointment = %appointment.id,
            stylist = %appointment.stylist,
            date = %appointment.date,
            time = %appointment.display_time(),
            "appointment booked"
        );

        // No subscribers is fine.
        let _ = self.events.send(BookingEvent {
            session_id: appointment.session_id.clone(),
            appointment: appointment.clone(),
        });

        let ics = generate_ics(&appointment, &self.salon.name);
        let email = confirmation_email(&appointment, &self.salon.name, ics);
        if let Err(e) = self.mailer.send(&email).await {
            tracing::error!(appointment = %appointment.id, error = %e, "failed to send confirmation email");
        }

        Ok(appointment)
    }
}

#[async_trait]
impl BookingHandler for AppointmentScheduler<'_> {
    async fn book(
        &self,
        session_id: &str,
        record: &BookingRecord,
    ) -> Result<Appointment, SchedulingError> {
        let request = BookingRequest::from_record(session_id, record)?;
        self.schedule(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mail::Email;
    use chrono::Weekday;

    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn new(fail: bool) -> Self {
            Self {
                sent: Mutex::new(vec![]),
                fail,
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn setup_db() -> Arc<Mutex<Connection>> {
        Arc::new(Mutex::new(db::init_db(":memory:").unwrap()))
    }

    // 2025-06-16 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn monday_morning() -> NaiveDateTime {
        monday().and_hms_opt(9, 0, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn request(stylist: &str, date: DateToken, time: NaiveTime) -> BookingRequest {
        BookingRequest {
            session_id: Some("client-1".to_string()),
            customer_name: Some("Priya".to_string()),
            service: "Haircut".to_string(),
            stylist: stylist.to_string(),
            date,
            time,
            email: "priya@gmail.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schedule_stores_announces_and_mails() {
        let db = setup_db();
        let salon = SalonConfig::default();
        let mailer = RecordingMailer::new(false);
        let (tx, mut rx) = broadcast::channel(8);
        let scheduler = AppointmentScheduler::new(&db, &salon, &mailer, &tx);

        let appointment = scheduler
            .schedule_on(request("Riya", DateToken::Tomorrow, t(15, 0)), monday_morning())
            .await
            .unwrap();

        assert_eq!(appointment.date, NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
        assert_eq!(appointment.duration_minutes, 60);

        let stored = queries::get_appointment_by_id(&db.lock().unwrap(), &appointment.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.stylist, "Riya");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.appointment.id, appointment.id);
        assert_eq!(event.session_id.as_deref(), Some("client-1"));

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "priya@gmail.com");
        assert!(String::from_utf8_lossy(&sent[0].attachments[0].content).contains("DTSTART:20250617T150000"));
    }

    #[tokio::test]
    async fn test_conflict_only_for_same_stylist() {
        let db = setup_db();
        let salon = SalonConfig::default();
        let mailer = RecordingMailer::new(false);
        let (tx, _rx) = broadcast::channel(8);
        let scheduler = AppointmentScheduler::new(&db, &salon, &mailer, &tx);
        let friday = DateToken::Weekday(Weekday::Fri);

        scheduler
            .schedule_on(request("Riya", friday, t(11, 0)), monday_morning())
            .await
            .unwrap();

        let clash = scheduler
            .schedule_on(request("Riya", friday, t(11, 30)), monday_morning())
            .await;
        assert!(matches!(clash, Err(SchedulingError::Conflict { .. })));

        let other_stylist = scheduler
            .schedule_on(request("Maya", friday, t(11, 30)), monday_morning())
            .await;
        assert!(other_stylist.is_ok());

        // 12:00 starts exactly when the first one ends
        let adjacent = scheduler
            .schedule_on(request("Riya", friday, t(12, 0)), monday_morning())
            .await;
        assert!(adjacent.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_outside_hours_and_closed_days() {
        let db = setup_db();
        let salon = SalonConfig::default();
        let mailer = RecordingMailer::new(false);
        let (tx, _rx) = broadcast::channel(8);
        let scheduler = AppointmentScheduler::new(&db, &salon, &mailer, &tx);

        let late = scheduler
            .schedule_on(request("Alex", DateToken::Tomorrow, t(18, 30)), monday_morning())
            .await;
        assert!(matches!(late, Err(SchedulingError::OutsideBusinessHours { .. })));

        let sunday = scheduler
            .schedule_on(request("Alex", DateToken::Weekday(Weekday::Sun), t(11, 0)), monday_morning())
            .await;
        assert!(matches!(sunday, Err(SchedulingError::ClosedDay { .. })));

        let past = scheduler
            .schedule_on(
                request("Alex", DateToken::On(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()), t(11, 0)),
                monday_morning(),
            )
            .await;
        assert!(matches!(past, Err(SchedulingError::PastDate)));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_time_already_passed_today() {
        let db = setup_db();
        let salon = SalonConfig::default();
        let mailer = RecordingMailer::new(false);
        let (tx, _rx) = broadcast::channel(8);
        let scheduler = AppointmentScheduler::new(&db, &salon, &mailer, &tx);
        let afternoon = monday().and_hms_opt(16, 0, 0).unwrap();

        let gone = scheduler
            .schedule_on(request("Alex", DateToken::Today, t(11, 0)), afternoon)
            .await;
        assert!(matches!(gone, Err(SchedulingError::PastTime)));

        let later_today = scheduler
            .schedule_on(request("Alex", DateToken::Today, t(17, 0)), afternoon)
            .await;
        assert!(later_today.is_ok());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_fail_booking() {
        let db = setup_db();
        let salon = SalonConfig::default();
        let mailer = RecordingMailer::new(true);
        let (tx, _rx) = broadcast::channel(8);
        let scheduler = AppointmentScheduler::new(&db, &salon, &mailer, &tx);

        let result = scheduler
            .schedule_on(request("Sarah", DateToken::Tomorrow, t(10, 0)), monday_morning())
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_request_from_incomplete_record() {
        let record = BookingRecord {
            service: Some("Haircut".to_string()),
            ..Default::default()
        };
        match BookingRequest::from_record("s1", &record) {
            Err(SchedulingError::Incomplete(missing)) => {
                assert_eq!(missing, "stylist, date, time, email");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
