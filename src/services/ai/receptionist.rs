use std::collections::BTreeSet;

use crate::config::SalonConfig;
use crate::models::{Appointment, BookingRecord, Field, Turn};
use crate::services::ai::{ChatOptions, LlmProvider, Message};

pub const FALLBACK_REPLY: &str =
    "I apologize, I'm having trouble processing your request. Could you please repeat that?";

/// How the booking attempt for this turn went, if one was made.
#[derive(Debug, Clone)]
pub enum BookingNote {
    None,
    Confirmed(Appointment),
    Rejected(String),
    AlreadyBooked,
}

pub fn greeting(salon: &SalonConfig) -> String {
    format!(
        "Hello! Welcome to {}. I'm your AI receptionist. How can I help you today?",
        salon.name
    )
}

/// System prompt for the spoken receptionist, built from the salon details
/// and what is known about the booking so far.
pub fn system_prompt(
    salon: &SalonConfig,
    record: &BookingRecord,
    missing: &BTreeSet<Field>,
    note: &BookingNote,
) -> String {
    let services = salon
        .services
        .iter()
        .map(|s| {
            if s.description.is_empty() {
                s.name.clone()
            } else {
                format!("{} ({})", s.name, s.description)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let stylists = salon
        .stylists
        .iter()
        .map(|s| format!("  * {}: {}", s.name, s.specialty))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        r#"You are a friendly AI receptionist for {name}, a premium hair salon.

SALON DETAILS:
- Services: {services}
- Stylists and Specializations:
{stylists}
- Hours: {hours}

YOUR ROLE:
1. Greet customers warmly and professionally
2. Help them choose services based on their needs
3. Collect booking information: name, service, stylist, date, time, email
4. Answer questions about services and policies

STYLE:
- Warm, professional, conversational
- Keep responses concise (2-3 sentences max), they are read aloud
- Ask one question at a time

BOOKING DETAILS SO FAR:
{known}
"#,
        name = salon.name,
        hours = salon.hours.to_human_readable(),
        known = record.summary(),
    );

    match note {
        BookingNote::Confirmed(appointment) => {
            prompt.push_str(&format!(
                "\nThe appointment is now BOOKED: {} with {} on {} at {}. Confirm it warmly and \
                 mention that a confirmation email is on its way to {}.\n",
                appointment.service,
                appointment.stylist,
                appointment.display_date(),
                appointment.display_time(),
                appointment.email,
            ));
        }
        BookingNote::Rejected(reason) => {
            prompt.push_str(&format!(
                "\nThe booking could not be made: {reason}. Apologise briefly and ask for a \
                 different day or time.\n"
            ));
        }
        BookingNote::AlreadyBooked => {
            prompt.push_str(
                "\nThis customer's appointment is already booked. Answer questions, but do not \
                 take a new booking in this conversation.\n",
            );
        }
        BookingNote::None if !missing.is_empty() => {
            let asks = missing
                .iter()
                .map(|f| f.prompt_label())
                .collect::<Vec<_>>()
                .join("; ");
            prompt.push_str(&format!(
                "\nStill needed before booking: {asks}. Ask for the next one naturally.\n"
            ));
        }
        BookingNote::None => {}
    }

    prompt
}

/// Generates the receptionist's next line. Provider failures produce a
/// polite apology instead of an error.
pub async fn reply(
    llm: &dyn LlmProvider,
    system_prompt: &str,
    window: &[Turn],
) -> String {
    let messages: Vec<Message> = window.iter().map(Message::from).collect();
    match llm.chat(system_prompt, &messages, ChatOptions::CONVERSATION).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => FALLBACK_REPLY.to_string(),
        Err(e) => {
            tracing::error!(error = %e, "LLM reply failed");
            FALLBACK_REPLY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_salon_and_missing_fields() {
        let salon = SalonConfig::default();
        let record = BookingRecord {
            service: Some("Haircut".to_string()),
            ..Default::default()
        };
        let missing = BTreeSet::from([Field::Email, Field::Time]);
        let prompt = system_prompt(&salon, &record, &missing, &BookingNote::None);

        assert!(prompt.contains("Gloss & Glow Hair Salon"));
        assert!(prompt.contains("Riya: Haircuts & Styling"));
        assert!(prompt.contains("Mon, Tue, Wed, Thu, Fri, Sat: 10:00 AM - 7:00 PM"));
        assert!(prompt.contains("- Service: Haircut"));
        assert!(prompt.contains("their email address"));
    }

    #[test]
    fn test_prompt_mentions_rejection_reason() {
        let prompt = system_prompt(
            &SalonConfig::default(),
            &BookingRecord::default(),
            &BTreeSet::new(),
            &BookingNote::Rejected("Riya is already booked at that time".to_string()),
        );
        assert!(prompt.contains("Riya is already booked at that time"));
    }
}
