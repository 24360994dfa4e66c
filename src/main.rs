use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use receptionist::config::{AppConfig, SalonConfig};
use receptionist::db;
use receptionist::handlers;
use receptionist::services::ai::ollama::OllamaProvider;
use receptionist::services::ai::openai::OpenAiProvider;
use receptionist::services::ai::LlmProvider;
use receptionist::services::mail::sendgrid::SendGridMailer;
use receptionist::services::mail::{LogMailer, Mailer};
use receptionist::services::voice::elevenlabs::ElevenLabsTts;
use receptionist::services::voice::openai::OpenAiVoice;
use receptionist::services::voice::TextToSpeech;
use receptionist::state::{AppState, Providers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let salon = SalonConfig::load(config.salon_config_path.as_deref())?;
    tracing::info!(
        salon = %salon.name,
        services = salon.services.len(),
        stylists = salon.stylists.len(),
        "salon configuration loaded"
    );

    let conn = db::init_db(&config.database_url)?;

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "ollama" => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        }
        _ => {
            anyhow::ensure!(
                !config.openai_api_key.is_empty(),
                "OPENAI_API_KEY must be set when LLM_PROVIDER=openai"
            );
            tracing::info!("using OpenAI-compatible LLM provider (model: {})", config.openai_model);
            Box::new(OpenAiProvider::new(
                config.openai_api_key.clone(),
                config.openai_base_url.clone(),
                config.openai_model.clone(),
            ))
        }
    };

    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set, speech-to-text requests will fail");
    }
    let stt = OpenAiVoice::new(config.openai_api_key.clone(), config.openai_base_url.clone());

    let tts: Box<dyn TextToSpeech> = if config.elevenlabs_api_key.is_empty() {
        tracing::info!("using OpenAI text-to-speech");
        Box::new(OpenAiVoice::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        ))
    } else {
        tracing::info!("using ElevenLabs text-to-speech");
        Box::new(ElevenLabsTts::new(
            config.elevenlabs_api_key.clone(),
            config.elevenlabs_voice_id.clone(),
        ))
    };

    let mailer: Box<dyn Mailer> = if config.sendgrid_api_key.is_empty() || config.mail_from.is_empty() {
        tracing::warn!("SENDGRID_API_KEY or MAIL_FROM not set, confirmations will only be logged");
        Box::new(LogMailer)
    } else {
        Box::new(SendGridMailer::new(
            config.sendgrid_api_key.clone(),
            config.mail_from.clone(),
        ))
    };

    let port = config.port;
    let state = Arc::new(AppState::new(
        config,
        salon,
        conn,
        Providers {
            llm,
            stt: Box::new(stt),
            tts,
            mailer,
        },
    )?);

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
