//! `SpeechSynthesizer` trait and the OpenAI `/v1/audio/speech` backend.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SpeechConfig;

/// Errors that can occur while synthesizing speech.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    /// The endpoint answered with zero bytes of audio.
    #[error("speech endpoint returned no audio")]
    EmptyAudio,
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else {
            SpeechError::Request(e.to_string())
        }
    }
}

/// Text in, encoded audio (mp3) out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// OpenAI-compatible text-to-speech client.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    config: SpeechConfig,
    api_key: Option<String>,
}

impl OpenAiSpeech {
    /// Build from config.  When `config.api_key` is unset the
    /// `OPENAI_API_KEY` environment variable is used.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.is_empty());

        Self {
            client,
            config: config.clone(),
            api_key,
        }
    }

    fn body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "input": text,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!("{}/v1/audio/speech", self.config.base_url);

        let mut req = self.client.post(&url).json(&self.body(text));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;
        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        log::debug!("speech: synthesized {} bytes for {} chars", audio.len(), text.len());
        Ok(audio.to_vec())
    }
}
