use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::TextToSpeech;

const API_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// ElevenLabs synthesis, preferred over OpenAI when a key is configured.
pub struct ElevenLabsTts {
    api_key: String,
    voice_id: String,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(api_key: String, voice_id: String) -> Self {
        Self {
            api_key,
            voice_id,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let body = json!({
            "text": text,
            "model_id": "eleven_monolingual_v1",
        });

        let resp = self
            .client
            .post(format!("{API_URL}/{}", self.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .context("failed to call ElevenLabs API")?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs API error ({}): {}", status, detail);
        }

        let audio = resp
            .bytes()
            .await
            .context("failed to read ElevenLabs audio")?;
        Ok(audio.to_vec())
    }
}
