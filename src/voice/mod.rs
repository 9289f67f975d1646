//! Voice pipeline
//!
//! Provider gateways (STT, reply generation, TTS) sit behind small capability
//! traits so the turn processor and the session coordinator never depend on a
//! concrete vendor. Every call takes the session's cancellation token.

mod llm;
mod stt;
mod tts;
mod turn;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use llm::{ChatCompletion, GenerationError};
pub use stt::{SpeechToText, SttError};
pub use tts::{SynthesisError, TextToSpeech};
pub use turn::{TurnError, TurnProcessor, truncate_reply};

use crate::Result;
use crate::config::{Config, clone_secret};

/// Converts audio to text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance
    async fn transcribe(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> std::result::Result<String, SttError>;
}

/// Produces a reply for a prompt
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate reply text
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, GenerationError>;
}

/// Converts text to audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize reply audio
    async fn synthesize(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<u8>, SynthesisError>;
}

/// The three provider gateways, built once at startup
#[derive(Clone)]
pub struct Gateways {
    pub stt: Arc<dyn Transcriber>,
    pub llm: Arc<dyn Generator>,
    pub tts: Arc<dyn Synthesizer>,
}

impl Gateways {
    /// Build the HTTP gateways from configuration
    ///
    /// # Errors
    ///
    /// Returns error if any credential is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let missing = || crate::Error::Config("missing provider credentials".to_string());
        let hf = config.api_keys.huggingface.as_ref().ok_or_else(missing)?;
        let groq = config.api_keys.groq.as_ref().ok_or_else(missing)?;
        let unreal = config.api_keys.unreal_speech.as_ref().ok_or_else(missing)?;

        Ok(Self {
            stt: Arc::new(SpeechToText::new(clone_secret(hf), config.stt.clone())?),
            llm: Arc::new(ChatCompletion::new(clone_secret(groq), config.llm.clone())?),
            tts: Arc::new(TextToSpeech::new(clone_secret(unreal), config.tts.clone())?),
        })
    }

    /// Turn processor over these gateways
    #[must_use]
    pub fn turn_processor(&self, config: crate::config::TurnConfig) -> TurnProcessor {
        TurnProcessor::new(
            Arc::clone(&self.stt),
            Arc::clone(&self.llm),
            Arc::clone(&self.tts),
            config,
        )
    }
}
