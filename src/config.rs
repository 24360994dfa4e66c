use std::env;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::BusinessHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub llm_provider: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub elevenlabs_api_key: String,
    pub elevenlabs_voice_id: String,
    pub sendgrid_api_key: String,
    pub mail_from: String,
    pub salon_config_path: Option<String>,
    pub llm_extraction: bool,
    pub llm_extraction_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "receptionist.db".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            elevenlabs_api_key: env::var("ELEVENLABS_API_KEY").unwrap_or_default(),
            elevenlabs_voice_id: env::var("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM").unwrap_or_default(),
            salon_config_path: env::var("SALON_CONFIG").ok().filter(|p| !p.is_empty()),
            llm_extraction: env::var("LLM_EXTRACTION")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(true),
            llm_extraction_timeout: Duration::from_millis(
                env::var("LLM_EXTRACTION_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(8000),
            ),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServiceOffering {
    pub name: String,
    /// Lower-case phrases that count as a mention of this service.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StylistProfile {
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Everything the extraction core needs to know about the business.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SalonConfig {
    pub name: String,
    pub services: Vec<ServiceOffering>,
    pub stylists: Vec<StylistProfile>,
    pub hours: BusinessHours,
    pub appointment_minutes: i32,
    pub context_window: usize,
    pub require_customer_name: bool,
}

impl Default for SalonConfig {
    fn default() -> Self {
        Self {
            name: "Gloss & Glow Hair Salon".to_string(),
            services: vec![
                offering("Haircut", &["haircut", "hair cut", "cut", "trim"], "Cuts and trims"),
                offering(
                    "Coloring",
                    &["coloring", "colouring", "color", "colour", "highlights", "dye"],
                    "Hair coloring and highlights",
                ),
                offering("Styling", &["styling", "style", "blowout", "blow dry"], "Styling for any occasion"),
                offering(
                    "Spa Treatment",
                    &["spa treatment", "hair spa", "spa", "treatment"],
                    "Spa treatments and hair care",
                ),
            ],
            stylists: vec![
                stylist("Riya", "Haircuts & Styling"),
                stylist("Maya", "Hair Coloring & Highlights"),
                stylist("Sarah", "Spa Treatments & Hair Care"),
                stylist("Alex", "Creative Cuts & Color"),
            ],
            hours: BusinessHours::default(),
            appointment_minutes: 60,
            context_window: 10,
            require_customer_name: true,
        }
    }
}

fn offering(name: &str, aliases: &[&str], description: &str) -> ServiceOffering {
    ServiceOffering {
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        description: description.to_string(),
    }
}

fn stylist(name: &str, specialty: &str) -> StylistProfile {
    StylistProfile {
        name: name.to_string(),
        specialty: specialty.to_string(),
        aliases: Vec::new(),
    }
}

impl SalonConfig {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let config: SalonConfig = serde_json::from_str(s).context("invalid salon config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the override file when one is configured, else the defaults.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read salon config: {path}"))?;
                Self::from_json(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.services.is_empty() {
            anyhow::bail!("salon config needs at least one service");
        }
        if self.stylists.is_empty() {
            anyhow::bail!("salon config needs at least one stylist");
        }
        if let Some(s) = self.services.iter().find(|s| s.name.trim().is_empty()) {
            anyhow::bail!("service with empty name (aliases: {:?})", s.aliases);
        }
        if self.stylists.iter().any(|s| s.name.trim().is_empty()) {
            anyhow::bail!("stylist with empty name");
        }
        if self.context_window == 0 {
            anyhow::bail!("context_window must be at least 1");
        }
        if self.appointment_minutes <= 0 {
            anyhow::bail!("appointment_minutes must be positive");
        }
        self.hours.validate()
    }

    /// The phrases that identify a service: its aliases plus its own name.
    pub fn service_vocabulary(&self) -> Vec<(String, Vec<String>)> {
        self.services
            .iter()
            .map(|s| (s.name.clone(), with_name(&s.name, &s.aliases)))
            .collect()
    }

    pub fn stylist_vocabulary(&self) -> Vec<(String, Vec<String>)> {
        self.stylists
            .iter()
            .map(|s| (s.name.clone(), with_name(&s.name, &s.aliases)))
            .collect()
    }
}

fn with_name(name: &str, aliases: &[String]) -> Vec<String> {
    let mut phrases: Vec<String> = aliases.iter().map(|a| a.trim().to_lowercase()).collect();
    phrases.push(name.trim().to_lowercase());
    phrases.retain(|p| !p.is_empty());
    phrases.sort();
    phrases.dedup();
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_salon_is_valid() {
        let salon = SalonConfig::default();
        assert!(salon.validate().is_ok());
        assert_eq!(salon.context_window, 10);
        assert_eq!(salon.stylists.len(), 4);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let json = r#"{
            "name": "Test Salon",
            "services": [{"name": "Beard Trim", "aliases": ["beard"]}],
            "stylists": [{"name": "Jo"}]
        }"#;
        let salon = SalonConfig::from_json(json).unwrap();
        assert_eq!(salon.name, "Test Salon");
        assert_eq!(salon.context_window, 10);
        assert_eq!(salon.hours, BusinessHours::default());
        let vocab = salon.service_vocabulary();
        assert_eq!(vocab[0].0, "Beard Trim");
        assert!(vocab[0].1.contains(&"beard".to_string()));
        assert!(vocab[0].1.contains(&"beard trim".to_string()));
    }

    #[test]
    fn test_from_json_rejects_bad_hours() {
        let json = r#"{"hours": {"days": ["mon"], "open": "9am", "close": "17:00"}}"#;
        assert!(SalonConfig::from_json(json).is_err());
    }

    #[test]
    fn test_from_json_rejects_empty_roster() {
        let json = r#"{"stylists": []}"#;
        assert!(SalonConfig::from_json(json).is_err());
    }
}
