pub mod extraction;
pub mod ollama;
pub mod openai;
pub mod receptionist;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Turn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.text.clone(),
        }
    }
}

/// Sampling knobs per call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object response.
    pub json: bool,
}

impl ChatOptions {
    /// Spoken replies: short and a little varied.
    pub const CONVERSATION: ChatOptions = ChatOptions {
        temperature: 0.7,
        max_tokens: Some(200),
        json: false,
    };

    /// Field extraction: as deterministic as the provider allows.
    pub const EXTRACTION: ChatOptions = ChatOptions {
        temperature: 0.1,
        max_tokens: None,
        json: true,
    };
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: ChatOptions,
    ) -> anyhow::Result<String>;
}
