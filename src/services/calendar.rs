use crate::models::Appointment;

pub fn generate_ics(appointment: &Appointment, salon_name: &str) -> String {
    let dtstart = appointment.starts_at().format("%Y%m%dT%H%M%S").to_string();
    let dtend = appointment.ends_at().format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = appointment.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@receptionist", appointment.id);

    let summary = format!("{} with {} at {}", appointment.service, appointment.stylist, salon_name);
    let description = match &appointment.customer_name {
        Some(name) => format!("{} for {}", appointment.service, name),
        None => appointment.service.clone(),
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Receptionist//Salon Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         LOCATION:{salon_name}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn appointment(customer_name: Option<&str>, hour: u32, minute: u32, duration: i32) -> Appointment {
        let created =
            NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Appointment {
            id: "test-123".to_string(),
            session_id: Some("client-1".to_string()),
            customer_name: customer_name.map(str::to_string),
            service: "Haircut".to_string(),
            stylist: "Riya".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
            duration_minutes: duration,
            email: "alice@example.com".to_string(),
            status: AppointmentStatus::Confirmed,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&appointment(Some("Alice"), 14, 0, 60), "Gloss & Glow");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T150000"));
        assert!(ics.contains("SUMMARY:Haircut with Riya at Gloss & Glow"));
        assert!(ics.contains("DESCRIPTION:Haircut for Alice"));
        assert!(ics.contains("UID:test-123@receptionist"));
        assert!(ics.contains("END:VEVENT"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_generate_ics_without_name() {
        let ics = generate_ics(&appointment(None, 9, 30, 30), "Test Salon");
        assert!(ics.contains("DTSTART:20250315T093000"));
        assert!(ics.contains("DTEND:20250315T100000"));
        assert!(ics.contains("DESCRIPTION:Haircut\r\n"));
    }
}
