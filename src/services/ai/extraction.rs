use async_trait::async_trait;

use crate::config::SalonConfig;
use crate::models::{BookingRecord, Field};
use crate::services::ai::{ChatOptions, LlmProvider, Message};
use crate::services::extraction::{FieldExtractionProvider, FieldMap};

const SYSTEM_PROMPT: &str = "You are a data extraction assistant for a hair salon. Extract appointment \
information accurately from speech-to-text transcripts. Convert spoken email addresses properly \
('at the rate' means '@', 'dot' means '.'). Return ONLY a valid JSON object.";

/// Secondary extraction pass backed by the configured language model.
pub struct LlmFieldExtractor<'a> {
    llm: &'a dyn LlmProvider,
    salon: &'a SalonConfig,
}

impl<'a> LlmFieldExtractor<'a> {
    pub fn new(llm: &'a dyn LlmProvider, salon: &'a SalonConfig) -> Self {
        Self { llm, salon }
    }

    fn prompt(&self, text: &str, known: &BookingRecord) -> String {
        let services = self
            .salon
            .services
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let stylists = self
            .salon
            .stylists
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Extract appointment booking information from this conversation text.
The text comes from speech-to-text and may contain variations like:
- "my email is shresth at the rate 4236 at gmail dot com" -> shresth4236@gmail.com
- "my name is john smith" -> John Smith
- "eleven am" or "11 am" -> 11:00 AM

Conversation text: "{text}"

Already known:
{known}

Return JSON with the keys customer_name, service_type, preferred_stylist, date, time, email.
Use null for anything not mentioned.
Service types: {services}
Stylists: {stylists}
Date: a weekday name, "today", "tomorrow", or YYYY-MM-DD.
Time: 12-hour format with AM/PM (e.g. 11:00 AM)."#,
            known = known.summary(),
        )
    }
}

#[async_trait]
impl FieldExtractionProvider for LlmFieldExtractor<'_> {
    async fn extract_fields(&self, text: &str, known: &BookingRecord) -> FieldMap {
        let messages = [Message {
            role: "user".to_string(),
            content: self.prompt(text, known),
        }];

        match self
            .llm
            .chat(SYSTEM_PROMPT, &messages, ChatOptions::EXTRACTION)
            .await
        {
            Ok(response) => parse_field_response(&response),
            Err(e) => {
                tracing::warn!(error = %e, "LLM field extraction failed");
                FieldMap::new()
            }
        }
    }
}

fn parse_json_object(response: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    // Try direct parse first
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(response) {
        return Some(map);
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(cleaned) {
        return Some(map);
    }

    // Try to find JSON object in the response
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    match serde_json::from_str(cleaned.get(start..=end)?) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Keeps string values under recognised keys; nulls and unknown keys
/// (e.g. a phone number) are dropped.
fn parse_field_response(response: &str) -> FieldMap {
    let Some(map) = parse_json_object(response) else {
        tracing::warn!("failed to parse LLM response as field JSON, ignoring");
        return FieldMap::new();
    };

    let mut fields = FieldMap::new();
    for (key, value) in map {
        let (Some(field), Some(value)) = (Field::parse(&key), value.as_str()) else {
            continue;
        };
        let value = value.trim();
        if !value.is_empty() && !value.eq_ignore_ascii_case("null") {
            fields.insert(field, value.to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedLlm(anyhow::Result<String>);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            options: ChatOptions,
        ) -> anyhow::Result<String> {
            assert!(options.json);
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"customer_name":"John Smith","service_type":"Hair Coloring","preferred_stylist":null,"date":"Tomorrow","time":"11:00 AM","email":null,"phone":"555"}"#;
        let fields = parse_field_response(json);
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[&Field::CustomerName], "John Smith");
        assert_eq!(fields[&Field::Service], "Hair Coloring");
        assert!(!fields.contains_key(&Field::Stylist));
    }

    #[test]
    fn test_parse_markdown_fenced_json() {
        let json = "```json\n{\"email\": \"a@b.com\"}\n```";
        let fields = parse_field_response(json);
        assert_eq!(fields[&Field::Email], "a@b.com");
    }

    #[test]
    fn test_parse_embedded_json() {
        let raw = "Sure! Here you go: {\"time\": \"3 PM\"} Hope that helps.";
        assert_eq!(parse_field_response(raw)[&Field::Time], "3 PM");
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_field_response("I could not find anything").is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_fails_closed() {
        let salon = SalonConfig::default();
        let llm = CannedLlm(Err(anyhow::anyhow!("connection refused")));
        let extractor = LlmFieldExtractor::new(&llm, &salon);
        let fields = extractor
            .extract_fields("haircut tomorrow", &BookingRecord::default())
            .await;
        assert!(fields.is_empty());
    }

    #[tokio::test]
    async fn test_provider_response_is_mapped() {
        let salon = SalonConfig::default();
        let llm = CannedLlm(Ok(r#"{"preferred_stylist": "Maya"}"#.to_string()));
        let extractor = LlmFieldExtractor::new(&llm, &salon);
        let fields = extractor
            .extract_fields("with maya", &BookingRecord::default())
            .await;
        assert_eq!(fields[&Field::Stylist], "Maya");
    }
}
