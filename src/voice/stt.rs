//! Speech-to-text (STT) gateway
//!
//! Posts the raw turn audio to a Whisper inference endpoint. The hosted model
//! may be cold; a `503` carrying a "loading" marker is retried after the
//! provider's estimated warm-up time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::Transcriber;
use crate::config::SttConfig;
use crate::{Error, Result};

/// Transcription failure classes
#[derive(Debug, thiserror::Error)]
pub enum SttError {
    /// Authentication, payment or quota rejection
    #[error("authentication or quota error with the transcription service")]
    Auth,

    /// Model still loading after every allowed attempt
    #[error("model did not load after {attempts} attempts")]
    ModelUnavailable { attempts: u32 },

    /// Any other provider response
    #[error("unexpected transcription response: {0}")]
    Unexpected(String),

    /// Network-level failure
    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Session token cancelled mid-call
    #[error("transcription cancelled")]
    Cancelled,
}

/// Successful Whisper response
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Error body returned while the model is warming up
#[derive(Deserialize)]
struct WhisperErrorResponse {
    error: String,
    #[serde(default)]
    estimated_time: f64,
}

/// What a single provider response means for the retry loop
#[derive(Debug, PartialEq)]
enum Attempt {
    Transcript(String),
    Loading(Duration),
    Failed(StatusCode),
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    config: SttConfig,
}

impl SpeechToText {
    /// Create a new STT gateway
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: SecretString, config: SttConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Hugging Face API key required for transcription".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Interpret one response
    fn classify(&self, status: StatusCode, body: &[u8]) -> std::result::Result<Attempt, SttError> {
        if status.is_success() {
            let parsed: WhisperResponse = serde_json::from_slice(body).map_err(|e| {
                tracing::error!(
                    body = %String::from_utf8_lossy(body),
                    "failed to parse successful Whisper response"
                );
                SttError::Unexpected(format!("malformed transcript body: {e}"))
            })?;
            return Ok(Attempt::Transcript(parsed.text));
        }

        if status == StatusCode::SERVICE_UNAVAILABLE {
            if let Some(wait) = loading_delay(body, &self.config) {
                return Ok(Attempt::Loading(wait));
            }
        }

        Ok(Attempt::Failed(status))
    }

    async fn send_once(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> std::result::Result<(StatusCode, Vec<u8>), SttError> {
        let request = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.api_key.expose_secret())
            .header(CONTENT_TYPE, &self.config.content_type)
            .body(audio.to_vec());

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SttError::Cancelled),
            sent = request.send() => sent?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SttError::Cancelled),
            body = response.bytes() => body?,
        };

        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> std::result::Result<String, SttError> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let (status, body) = self.send_once(audio, cancel).await?;
            tracing::debug!(status = %status, attempt, "received response");

            match self.classify(status, &body)? {
                Attempt::Transcript(text) => {
                    tracing::info!(transcript = %text, "transcription complete");
                    return Ok(text);
                }
                Attempt::Loading(wait) => {
                    if attempt == attempts {
                        break;
                    }
                    tracing::warn!(attempt, wait = ?wait, "model is loading, retrying");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(SttError::Cancelled),
                        () = tokio::time::sleep(wait) => {}
                    }
                }
                Attempt::Failed(status) if is_auth_failure(status) => {
                    tracing::error!(
                        status = %status,
                        body = %String::from_utf8_lossy(&body),
                        "auth/payment error from Whisper API"
                    );
                    return Err(SttError::Auth);
                }
                Attempt::Failed(status) => {
                    tracing::error!(
                        status = %status,
                        body = %String::from_utf8_lossy(&body),
                        "unexpected Whisper API response"
                    );
                    return Err(SttError::Unexpected(format!("status {status}")));
                }
            }
        }

        Err(SttError::ModelUnavailable { attempts })
    }
}

/// Statuses that mean the credentials or the quota are the problem
const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::PAYMENT_REQUIRED
            | StatusCode::FORBIDDEN
            | StatusCode::TOO_MANY_REQUESTS
    )
}

/// Warm-up wait for a "model loading" body, or `None` if the body says something else
///
/// The provider's estimate is truncated to whole seconds, padded, then capped.
fn loading_delay(body: &[u8], config: &SttConfig) -> Option<Duration> {
    let parsed: WhisperErrorResponse = serde_json::from_slice(body).ok()?;
    if !parsed.error.to_lowercase().contains("loading") {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let estimated = Duration::from_secs(parsed.estimated_time.max(0.0).floor() as u64);

    Some((estimated + config.retry_padding).min(config.max_retry_delay))
}
