pub mod elevenlabs;
pub mod openai;

use async_trait::async_trait;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribes one recorded utterance. `None` when nothing was said.
    async fn transcribe(&self, audio: Vec<u8>) -> anyhow::Result<Option<String>>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesizes `text` to MP3 audio.
    async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}
