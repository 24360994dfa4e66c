use std::collections::BTreeSet;

use crate::config::SalonConfig;
use crate::models::{BookingRecord, BusinessHours, Field};

/// Decides whether a record carries enough to attempt a booking.
#[derive(Debug, Clone)]
pub struct CompletenessGate {
    require_customer_name: bool,
    hours: BusinessHours,
    appointment_minutes: i32,
}

impl CompletenessGate {
    pub fn new(require_customer_name: bool, hours: BusinessHours, appointment_minutes: i32) -> Self {
        Self {
            require_customer_name,
            hours,
            appointment_minutes,
        }
    }

    pub fn from_salon(salon: &SalonConfig) -> Self {
        Self::new(
            salon.require_customer_name,
            salon.hours.clone(),
            salon.appointment_minutes,
        )
    }

    pub fn required_fields(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL
            .into_iter()
            .filter(|f| *f != Field::CustomerName || self.require_customer_name)
    }

    /// Fields the customer still has to provide. A time whose appointment
    /// would not fit in business hours, or a day the salon is closed,
    /// counts as missing.
    pub fn missing_fields(&self, record: &BookingRecord) -> BTreeSet<Field> {
        let mut missing: BTreeSet<Field> = self
            .required_fields()
            .filter(|f| !record.is_set(*f))
            .collect();

        if let Some(time) = record.time {
            if !self.hours.end_within(time, self.appointment_minutes) {
                missing.insert(Field::Time);
            }
        }
        if let Some(weekday) = record.date.and_then(|d| d.weekday()) {
            if !self.hours.is_open_on(weekday) {
                missing.insert(Field::Date);
            }
        }
        missing
    }

    pub fn is_complete(&self, record: &BookingRecord) -> bool {
        self.missing_fields(record).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateToken;
    use chrono::{NaiveTime, Weekday};

    fn full_record() -> BookingRecord {
        BookingRecord {
            customer_name: Some("Priya".to_string()),
            service: Some("Haircut".to_string()),
            stylist: Some("Maya".to_string()),
            date: Some(DateToken::Tomorrow),
            time: NaiveTime::from_hms_opt(15, 0, 0),
            email: Some("priya@gmail.com".to_string()),
        }
    }

    fn gate() -> CompletenessGate {
        CompletenessGate::new(true, BusinessHours::default(), 60)
    }

    #[test]
    fn test_full_record_is_complete() {
        assert!(gate().is_complete(&full_record()));
    }

    #[test]
    fn test_only_email_missing() {
        let record = BookingRecord {
            email: None,
            ..full_record()
        };
        assert!(!gate().is_complete(&record));
        assert_eq!(gate().missing_fields(&record), BTreeSet::from([Field::Email]));
    }

    #[test]
    fn test_empty_record_lists_everything() {
        let missing = gate().missing_fields(&BookingRecord::default());
        assert_eq!(missing.len(), 6);
    }

    #[test]
    fn test_name_optional_when_configured() {
        let record = BookingRecord {
            customer_name: None,
            ..full_record()
        };
        let lenient = CompletenessGate::new(false, BusinessHours::default(), 60);
        assert!(lenient.is_complete(&record));
        assert_eq!(
            gate().missing_fields(&record),
            BTreeSet::from([Field::CustomerName])
        );
    }

    #[test]
    fn test_out_of_hours_time_needs_reprompt() {
        let record = BookingRecord {
            time: NaiveTime::from_hms_opt(20, 0, 0),
            ..full_record()
        };
        assert_eq!(gate().missing_fields(&record), BTreeSet::from([Field::Time]));
    }

    #[test]
    fn test_appointment_running_past_closing_needs_reprompt() {
        let record = BookingRecord {
            time: NaiveTime::from_hms_opt(18, 30, 0),
            ..full_record()
        };
        assert_eq!(gate().missing_fields(&record), BTreeSet::from([Field::Time]));

        let last_slot = BookingRecord {
            time: NaiveTime::from_hms_opt(18, 0, 0),
            ..full_record()
        };
        assert!(gate().is_complete(&last_slot));
    }

    #[test]
    fn test_closed_day_needs_reprompt() {
        let record = BookingRecord {
            date: Some(DateToken::Weekday(Weekday::Sun)),
            ..full_record()
        };
        assert_eq!(gate().missing_fields(&record), BTreeSet::from([Field::Date]));
    }
}
