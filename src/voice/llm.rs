//! Reply generation gateway (OpenAI-compatible chat completions)

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::Generator;
use crate::config::LlmConfig;
use crate::{Error, Result};

/// Reply generation failures
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Provider answered with a non-success status
    #[error("generation failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered but the first choice had no content
    #[error("generation failed: completion contained no content")]
    EmptyCompletion,

    /// Network-level or decoding failure
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Session token cancelled mid-call
    #[error("generation cancelled")]
    Cancelled,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
    }
}

/// Generates conversational replies from a chat completion provider
pub struct ChatCompletion {
    client: reqwest::Client,
    api_key: SecretString,
    config: LlmConfig,
}

impl ChatCompletion {
    /// Create a new generation gateway
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: SecretString, config: LlmConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Groq API key required for reply generation".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    async fn request(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "chat completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion API error");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat completion response");
            e
        })?;

        parsed.into_content().ok_or(GenerationError::EmptyCompletion)
    }
}

#[async_trait]
impl Generator for ChatCompletion {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, GenerationError> {
        tracing::debug!(prompt_chars = prompt.chars().count(), model = %self.config.model, "generating reply");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GenerationError::Cancelled),
            reply = self.request(prompt) => reply,
        }
    }
}
