use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::BookingRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// One utterance in a session. Never edited after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: NaiveDateTime,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now().naive_utc(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now().naive_utc(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Collecting,
    Booked,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Collecting => "collecting",
            SessionStatus::Booked => "booked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "booked" => SessionStatus::Booked,
            _ => SessionStatus::Collecting,
        }
    }
}

/// Per-client state. The turns themselves live in conversation memory;
/// the session carries the accumulated record and its booking status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub record: BookingRecord,
    pub status: SessionStatus,
    pub appointment_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Session {
    pub fn new(id: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: id.to_string(),
            record: BookingRecord::default(),
            status: SessionStatus::Collecting,
            appointment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_booked(&self) -> bool {
        self.status == SessionStatus::Booked
    }
}
