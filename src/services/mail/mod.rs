pub mod sendgrid;

use async_trait::async_trait;

use crate::models::Appointment;

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Used when no mail credentials are configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            "mail credentials not configured, confirmation not delivered"
        );
        Ok(())
    }
}

pub fn confirmation_email(appointment: &Appointment, salon_name: &str, ics: String) -> Email {
    let greeting = appointment
        .customer_name
        .as_deref()
        .map(|name| format!("Dear {name},"))
        .unwrap_or_else(|| "Hello,".to_string());

    let body = format!(
        "{greeting}\n\n\
         Your appointment has been confirmed! Here are the details:\n\n\
         Service: {service}\n\
         Stylist: {stylist}\n\
         Date: {date}\n\
         Time: {time}\n\
         Location: {salon_name}\n\n\
         A calendar invite is attached.\n\n\
         We look forward to serving you!\n\n\
         Best regards,\n\
         The {salon_name} Team\n",
        service = appointment.service,
        stylist = appointment.stylist,
        date = appointment.display_date(),
        time = appointment.display_time(),
    );

    Email {
        to: appointment.email.clone(),
        subject: format!(
            "Appointment Confirmation - {} at {salon_name}",
            appointment.service
        ),
        body,
        attachments: vec![Attachment {
            filename: "appointment.ics".to_string(),
            content_type: "text/calendar".to_string(),
            content: ics.into_bytes(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, NaiveTime, Utc};

    #[test]
    fn test_confirmation_email_contents() {
        let now = Utc::now().naive_utc();
        let appointment = Appointment {
            id: "a1".to_string(),
            session_id: None,
            customer_name: Some("Priya".to_string()),
            service: "Coloring".to_string(),
            stylist: "Maya".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 17).unwrap(),
            time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            duration_minutes: 60,
            email: "priya@gmail.com".to_string(),
            status: AppointmentStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };

        let email = confirmation_email(&appointment, "Gloss & Glow", "BEGIN:VCALENDAR".to_string());
        assert_eq!(email.to, "priya@gmail.com");
        assert_eq!(email.subject, "Appointment Confirmation - Coloring at Gloss & Glow");
        assert!(email.body.starts_with("Dear Priya,"));
        assert!(email.body.contains("Date: Tuesday, June 17, 2025"));
        assert!(email.body.contains("Time: 3:00 PM"));
        assert_eq!(email.attachments[0].filename, "appointment.ics");
    }
}
