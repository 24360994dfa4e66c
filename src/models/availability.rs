use chrono::{Duration, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::record::format_time;

const DAY_ORDER: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Opening days and the daily window in which appointments may start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessHours {
    pub days: Vec<String>,
    pub open: String,
    pub close: String,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            days: ["mon", "tue", "wed", "thu", "fri", "sat"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            open: "10:00".to_string(),
            close: "19:00".to_string(),
        }
    }
}

impl BusinessHours {
    pub fn validate(&self) -> anyhow::Result<()> {
        for day in &self.days {
            parse_weekday(day)?;
        }
        let open = parse_time(&self.open)?;
        let close = parse_time(&self.close)?;
        if open >= close {
            anyhow::bail!("opening time {} must be before closing time {}", self.open, self.close);
        }
        Ok(())
    }

    pub fn open_time(&self) -> Option<NaiveTime> {
        parse_time(&self.open).ok()
    }

    pub fn close_time(&self) -> Option<NaiveTime> {
        parse_time(&self.close).ok()
    }

    pub fn is_open_on(&self, weekday: Weekday) -> bool {
        let key = DAY_ORDER[weekday.num_days_from_monday() as usize];
        self.days.iter().any(|d| d.to_lowercase() == key)
    }

    /// Whether an appointment may start at `time`: open <= time < close.
    pub fn is_within(&self, time: NaiveTime) -> bool {
        match (self.open_time(), self.close_time()) {
            (Some(open), Some(close)) => time >= open && time < close,
            _ => false,
        }
    }

    pub fn end_within(&self, start: NaiveTime, duration_minutes: i32) -> bool {
        let Some(close) = self.close_time() else {
            return false;
        };
        let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(duration_minutes as i64));
        self.is_within(start) && wrapped == 0 && end <= close
    }

    pub fn to_human_readable(&self) -> String {
        let mut days: Vec<&String> = self.days.iter().collect();
        days.sort_by_key(|d| {
            DAY_ORDER
                .iter()
                .position(|o| *o == d.to_lowercase())
                .unwrap_or(7)
        });
        let days = days
            .iter()
            .map(|d| capitalize(d))
            .collect::<Vec<_>>()
            .join(", ");

        match (self.open_time(), self.close_time()) {
            (Some(open), Some(close)) => {
                format!("{days}: {} - {}", format_time(open), format_time(close))
            }
            _ => days,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    if DAY_ORDER.contains(&s.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid weekday: {s}"))
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_default_hours_are_valid() {
        assert!(BusinessHours::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_day_rejected() {
        let hours = BusinessHours {
            days: vec!["xyz".to_string()],
            ..Default::default()
        };
        assert!(hours.validate().is_err());
    }

    #[test]
    fn test_invalid_time_rejected() {
        let hours = BusinessHours {
            open: "25:00".to_string(),
            ..Default::default()
        };
        assert!(hours.validate().is_err());

        let inverted = BusinessHours {
            open: "19:00".to_string(),
            close: "10:00".to_string(),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_is_within() {
        let hours = BusinessHours::default();
        assert!(hours.is_within(t("10:00")));
        assert!(hours.is_within(t("18:59")));
        assert!(!hours.is_within(t("19:00")));
        assert!(!hours.is_within(t("09:30")));
    }

    #[test]
    fn test_end_within() {
        let hours = BusinessHours::default();
        assert!(hours.end_within(t("18:00"), 60));
        assert!(!hours.end_within(t("18:30"), 60));
    }

    #[test]
    fn test_open_days() {
        let hours = BusinessHours::default();
        assert!(hours.is_open_on(Weekday::Sat));
        assert!(!hours.is_open_on(Weekday::Sun));
    }

    #[test]
    fn test_to_human_readable() {
        let hours = BusinessHours {
            days: vec!["fri".to_string(), "mon".to_string()],
            open: "09:00".to_string(),
            close: "17:00".to_string(),
        };
        assert_eq!(hours.to_human_readable(), "Mon, Fri: 9:00 AM - 5:00 PM");
    }
}
