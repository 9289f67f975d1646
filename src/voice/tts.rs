//! Text-to-speech (TTS) gateway

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::Synthesizer;
use crate::config::TtsConfig;
use crate::{Error, Result};

/// Speech synthesis failures
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    /// Provider answered with a non-success status
    #[error("synthesis failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Network-level failure
    #[error("synthesis request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Session token cancelled mid-call
    #[error("synthesis cancelled")]
    Cancelled,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StreamRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    bitrate: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    speed: &'a str,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

/// Synthesizes speech from text via an Unreal Speech style `/stream` endpoint
///
/// Returns MP3 audio bytes.
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice_id: String,
    config: TtsConfig,
}

impl TextToSpeech {
    /// Create a new TTS gateway
    ///
    /// # Errors
    ///
    /// Returns error if the API key or voice id is missing
    pub fn new(api_key: SecretString, config: TtsConfig) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Unreal Speech API key required for TTS".to_string(),
            ));
        }

        let voice_id = config
            .voice_id
            .clone()
            .ok_or_else(|| Error::Config("TTS voice id required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            voice_id,
            config,
        })
    }

    async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, SynthesisError> {
        let request = StreamRequest {
            text,
            voice_id: &self.voice_id,
            bitrate: &self.config.bitrate,
            speed: &self.config.speed,
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        tracing::debug!(chars = text.chars().count(), voice = %self.voice_id, "synthesizing reply");

        let audio = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SynthesisError::Cancelled),
            audio = self.request(text) => audio?,
        };

        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }
}
