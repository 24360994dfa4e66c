use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::{SpeechToText, TextToSpeech};

/// Whisper transcription and `tts-1` synthesis.
pub struct OpenAiVoice {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiVoice {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechToText for OpenAiVoice {
    async fn transcribe(&self, audio: Vec<u8>) -> anyhow::Result<Option<String>> {
        if audio.is_empty() {
            return Ok(None);
        }

        let file = Part::bytes(audio)
            .file_name("audio.webm")
            .mime_str("audio/webm")?;
        let form = Form::new()
            .text("model", "whisper-1")
            .text("language", "en")
            .part("file", file);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("failed to call Whisper API")?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Whisper response")?;

        if !status.is_success() {
            anyhow::bail!("Whisper API error ({}): {}", status, data);
        }

        Ok(data["text"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }
}

#[async_trait]
impl TextToSpeech for OpenAiVoice {
    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let body = json!({
            "model": "tts-1",
            "voice": "nova",
            "input": text,
        });

        let resp = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI speech API")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI speech API error ({}): {}", status, detail);
        }

        let audio = resp
            .bytes()
            .await
            .context("failed to read OpenAI speech audio")?;
        Ok(audio.to_vec())
    }
}
