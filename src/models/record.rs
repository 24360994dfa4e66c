use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A slot of the booking record that the extractors can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CustomerName,
    Service,
    Stylist,
    Date,
    Time,
    Email,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::CustomerName,
        Field::Service,
        Field::Stylist,
        Field::Date,
        Field::Time,
        Field::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CustomerName => "customer_name",
            Field::Service => "service",
            Field::Stylist => "stylist",
            Field::Date => "date",
            Field::Time => "time",
            Field::Email => "email",
        }
    }

    /// Accepts the canonical names plus the keys language models tend to emit.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "customer_name" | "name" | "customer" => Some(Field::CustomerName),
            "service" | "service_type" => Some(Field::Service),
            "stylist" | "preferred_stylist" => Some(Field::Stylist),
            "date" | "day" => Some(Field::Date),
            "time" => Some(Field::Time),
            "email" | "email_address" => Some(Field::Email),
            _ => None,
        }
    }

    /// Human wording used when asking the customer for this field.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Field::CustomerName => "their name",
            Field::Service => "which service they want",
            Field::Stylist => "their preferred stylist",
            Field::Date => "the appointment day",
            Field::Time => "a time within business hours",
            Field::Email => "their email address for the confirmation",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A day as the customer said it. Relative tokens are only pinned to a
/// calendar date when the appointment is actually scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DateToken {
    Today,
    Tomorrow,
    DayAfterTomorrow,
    Weekday(Weekday),
    MonthDay { month: u32, day: u32 },
    On(NaiveDate),
}

impl DateToken {
    /// Resolves the token against `today`. A bare weekday means the next
    /// occurrence strictly after today; a month/day that already passed
    /// this year rolls over to next year.
    pub fn resolve(&self, today: NaiveDate) -> Option<NaiveDate> {
        match *self {
            DateToken::Today => Some(today),
            DateToken::Tomorrow => Some(today + Duration::days(1)),
            DateToken::DayAfterTomorrow => Some(today + Duration::days(2)),
            DateToken::Weekday(weekday) => {
                let target = weekday.num_days_from_monday() as i64;
                let current = today.weekday().num_days_from_monday() as i64;
                let mut ahead = (target - current).rem_euclid(7);
                if ahead == 0 {
                    ahead = 7;
                }
                Some(today + Duration::days(ahead))
            }
            DateToken::MonthDay { month, day } => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
                match this_year {
                    Some(date) if date >= today => Some(date),
                    _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
                }
            }
            DateToken::On(date) => Some(date),
        }
    }

    /// The weekday, when it is known without a reference date.
    pub fn weekday(&self) -> Option<Weekday> {
        match self {
            DateToken::Weekday(weekday) => Some(*weekday),
            DateToken::On(date) => Some(date.weekday()),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DateToken::Today => "Today".to_string(),
            DateToken::Tomorrow => "Tomorrow".to_string(),
            DateToken::DayAfterTomorrow => "Day after tomorrow".to_string(),
            DateToken::Weekday(weekday) => capitalize(weekday_name(*weekday)),
            DateToken::MonthDay { month, day } => {
                format!("{} {day}", capitalize(MONTH_NAMES[(*month as usize).saturating_sub(1) % 12]))
            }
            DateToken::On(date) => date.format("%A, %B %-d, %Y").to_string(),
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

impl From<DateToken> for String {
    fn from(token: DateToken) -> Self {
        match token {
            DateToken::Today => "today".to_string(),
            DateToken::Tomorrow => "tomorrow".to_string(),
            DateToken::DayAfterTomorrow => "day-after-tomorrow".to_string(),
            DateToken::Weekday(weekday) => weekday_name(weekday).to_string(),
            DateToken::MonthDay { month, day } => format!("--{month:02}-{day:02}"),
            DateToken::On(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl TryFrom<String> for DateToken {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "today" => return Ok(DateToken::Today),
            "tomorrow" => return Ok(DateToken::Tomorrow),
            "day-after-tomorrow" => return Ok(DateToken::DayAfterTomorrow),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("--") {
            let (month, day) = rest
                .split_once('-')
                .ok_or_else(|| format!("invalid month-day: {s}"))?;
            let month: u32 = month.parse().map_err(|_| format!("invalid month in: {s}"))?;
            let day: u32 = day.parse().map_err(|_| format!("invalid day in: {s}"))?;
            // 2024 is a leap year, so Feb 29 stays representable.
            if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
                return Err(format!("month-day out of range: {s}"));
            }
            return Ok(DateToken::MonthDay { month, day });
        }
        if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
            return Ok(DateToken::On(date));
        }
        s.parse::<Weekday>()
            .map(DateToken::Weekday)
            .map_err(|_| format!("invalid date token: {s}"))
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// The appointment details accumulated over a conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub customer_name: Option<String>,
    pub service: Option<String>,
    pub stylist: Option<String>,
    pub date: Option<DateToken>,
    pub time: Option<NaiveTime>,
    pub email: Option<String>,
}

impl BookingRecord {
    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::CustomerName => self.customer_name.is_some(),
            Field::Service => self.service.is_some(),
            Field::Stylist => self.stylist.is_some(),
            Field::Date => self.date.is_some(),
            Field::Time => self.time.is_some(),
            Field::Email => self.email.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.is_set(*f))
    }

    pub fn display_time(&self) -> Option<String> {
        self.time.map(format_time)
    }

    /// One line per known field, for prompts and logs.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.customer_name {
            lines.push(format!("- Name: {name}"));
        }
        if let Some(service) = &self.service {
            lines.push(format!("- Service: {service}"));
        }
        if let Some(stylist) = &self.stylist {
            lines.push(format!("- Stylist: {stylist}"));
        }
        if let Some(date) = &self.date {
            lines.push(format!("- Date: {date}"));
        }
        if let Some(time) = self.display_time() {
            lines.push(format!("- Time: {time}"));
        }
        if let Some(email) = &self.email {
            lines.push(format!("- Email: {email}"));
        }
        if lines.is_empty() {
            "- nothing yet".to_string()
        } else {
            lines.join("\n")
        }
    }
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}
