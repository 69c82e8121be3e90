//! Core `VisionCoach` trait and `OpenAiVision` implementation.
//!
//! `OpenAiVision` calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint with image input.  All connection details come from
//! [`VisionConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use base64::Engine as _;
use thiserror::Error;

use crate::config::VisionConfig;
use crate::conversation::ConversationMessage;
use crate::session::CancellationToken;

// ---------------------------------------------------------------------------
// VisionError
// ---------------------------------------------------------------------------

/// Errors that can occur during vision inference.
#[derive(Debug, Error)]
pub enum VisionError {
    /// HTTP transport or connection error, or a non-success status.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("vision request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse vision response: {0}")]
    Parse(String),

    /// The model returned no usable text.
    #[error("vision model returned an empty response")]
    EmptyResponse,

    /// The session's cancellation token fired before a reply was accepted.
    #[error("vision request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for VisionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            VisionError::Timeout
        } else {
            VisionError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// VisionCoach trait
// ---------------------------------------------------------------------------

/// Async seam for the vision model.
///
/// # Arguments
/// * `history` – Snapshot of the conversation window, system entry first.
/// * `turn`    – The new user turn (instruction text plus optional frame).
/// * `cancel`  – Session token.  Implementations abort the remote call when
///               it fires and must never return `Ok` after it has fired.
#[async_trait]
pub trait VisionCoach: Send + Sync {
    async fn infer(
        &self,
        history: &[ConversationMessage],
        turn: &ConversationMessage,
        cancel: &CancellationToken,
    ) -> Result<String, VisionError>;
}

// ---------------------------------------------------------------------------
// Request body
// ---------------------------------------------------------------------------

/// `data:` URL for a JPEG frame.
fn image_url(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Chat-completions message for one history entry.  Entries with an image
/// use the multi-part content form.
fn message_json(message: &ConversationMessage) -> serde_json::Value {
    match &message.image {
        None => serde_json::json!({
            "role":    message.role.as_str(),
            "content": message.content,
        }),
        Some(image) => serde_json::json!({
            "role": message.role.as_str(),
            "content": [
                { "type": "text", "text": message.content },
                { "type": "image_url", "image_url": { "url": image_url(image.as_bytes()) } }
            ],
        }),
    }
}

pub(crate) fn request_body(
    config: &VisionConfig,
    history: &[ConversationMessage],
    turn: &ConversationMessage,
) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = history
        .iter()
        .chain(std::iter::once(turn))
        .map(message_json)
        .collect();

    serde_json::json!({
        "model":      config.model,
        "messages":   messages,
        "max_tokens": config.max_tokens,
        "stream":     false,
    })
}

pub(crate) fn reply_text(json: &serde_json::Value) -> Result<String, VisionError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(VisionError::EmptyResponse)?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(VisionError::EmptyResponse);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// OpenAiVision
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible chat-completions endpoint with image input.
pub struct OpenAiVision {
    client: reqwest::Client,
    config: VisionConfig,
    api_key: Option<String>,
}

impl OpenAiVision {
    /// Build from config.  When `config.api_key` is unset the
    /// `OPENAI_API_KEY` environment variable is used.
    pub fn from_config(config: &VisionConfig) -> Self {
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

    async fn send(
        &self,
        history: &[ConversationMessage],
        turn: &ConversationMessage,
    ) -> Result<String, VisionError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = request_body(&self.config, history, turn);

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?.error_for_status()?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        reply_text(&json)
    }
}

#[async_trait]
impl VisionCoach for OpenAiVision {
    async fn infer(
        &self,
        history: &[ConversationMessage],
        turn: &ConversationMessage,
        cancel: &CancellationToken,
    ) -> Result<String, VisionError> {
        log::debug!(
            "vision: sending {} history messages to {}",
            history.len(),
            self.config.model
        );
        // Dropping the in-flight request future aborts the HTTP call.
        cancel
            .guard(self.send(history, turn))
            .await
            .unwrap_or(Err(VisionError::Cancelled))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ImageData;

    #[test]
    fn request_body_appends_turn_after_history() {
        let config = VisionConfig::default();
        let history = vec![
            ConversationMessage::system("sys"),
            ConversationMessage::user("q0", None),
            ConversationMessage::assistant("a0"),
        ];
        let turn = ConversationMessage::user("q1", Some(ImageData::new(vec![0xFF, 0xD8])));

        let body = request_body(&config, &history, &turn);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(body["model"], "gpt-4.1-nano");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "sys");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"][0]["text"], "q1");
        assert_eq!(
            messages[3]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,/9g="
        );
    }

    #[test]
    fn reply_text_trims_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "  Move slightly right.\n" } }]
        });
        assert_eq!(reply_text(&json).unwrap(), "Move slightly right.");
    }

    #[test]
    fn reply_text_rejects_missing_or_blank_content() {
        let missing = serde_json::json!({ "choices": [] });
        assert!(matches!(reply_text(&missing), Err(VisionError::EmptyResponse)));

        let blank = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] });
        assert!(matches!(reply_text(&blank), Err(VisionError::EmptyResponse)));
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let mut config = VisionConfig::default();
        config.api_key = Some("sk-config".into());
        let client = OpenAiVision::from_config(&config);
        assert_eq!(client.api_key.as_deref(), Some("sk-config"));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_request() {
        let mut config = VisionConfig::default();
        // Unroutable; the request must never be awaited to completion.
        config.base_url = "http://10.255.255.1".into();
        let client = OpenAiVision::from_config(&config);

        let token = CancellationToken::new();
        token.signal();

        let result = client
            .infer(
                &[ConversationMessage::system("sys")],
                &ConversationMessage::user("q", None),
                &token,
            )
            .await;
        assert!(matches!(result, Err(VisionError::Cancelled)));
    }

    #[test]
    fn vision_is_object_safe() {
        let client: Box<dyn VisionCoach> =
            Box::new(OpenAiVision::from_config(&VisionConfig::default()));
        drop(client);
    }
}
