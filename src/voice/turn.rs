//! One conversational turn: transcribe, generate a reply, synthesize it

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{GenerationError, Generator, SttError, Synthesizer, SynthesisError, Transcriber};
use crate::config::TurnConfig;

/// Classified outcome of a failed turn
///
/// The session keeps listening after any of these; none of them closes the socket.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// Transcript came back empty
    #[error("no speech detected in audio")]
    NoSpeech,

    /// Speech-to-text failed
    #[error("STT error: {0}")]
    Transcription(#[from] SttError),

    /// Reply generation failed
    #[error("LLM error: {0}")]
    Generation(#[from] GenerationError),

    /// Reply was blank after trimming
    #[error("LLM generated an empty response")]
    EmptyGeneration,

    /// Speech synthesis failed
    #[error("TTS error: {0}")]
    Synthesis(#[from] SynthesisError),
}

impl TurnError {
    /// Expected empty-result outcomes, as opposed to provider failures
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::EmptyGeneration)
    }

    /// Whether the session token was cancelled while a provider call was running
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Transcription(SttError::Cancelled)
                | Self::Generation(GenerationError::Cancelled)
                | Self::Synthesis(SynthesisError::Cancelled)
        )
    }
}

/// Runs the STT → generation → TTS chain for one buffered utterance
#[derive(Clone)]
pub struct TurnProcessor {
    stt: Arc<dyn Transcriber>,
    llm: Arc<dyn Generator>,
    tts: Arc<dyn Synthesizer>,
    config: TurnConfig,
}

impl TurnProcessor {
    #[must_use]
    pub fn new(
        stt: Arc<dyn Transcriber>,
        llm: Arc<dyn Generator>,
        tts: Arc<dyn Synthesizer>,
        config: TurnConfig,
    ) -> Self {
        Self {
            stt,
            llm,
            tts,
            config,
        }
    }

    /// Turn rules in effect
    #[must_use]
    pub const fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Convert one utterance into reply audio
    ///
    /// # Errors
    ///
    /// Returns the first failing step as a classified [`TurnError`]
    pub async fn process(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TurnError> {
        let transcript = self.stt.transcribe(audio, cancel).await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(TurnError::NoSpeech);
        }
        tracing::debug!(transcript = %transcript, "transcribed turn");

        let prompt = self.prompt_for(transcript);
        let reply = self.llm.generate(&prompt, cancel).await?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(TurnError::EmptyGeneration);
        }

        let spoken = truncate_reply(reply, self.config.max_reply_chars);
        if spoken.len() < reply.len() {
            tracing::debug!(
                reply_chars = reply.chars().count(),
                spoken_chars = self.config.max_reply_chars,
                "truncated reply before synthesis"
            );
        }

        let audio = self.tts.synthesize(spoken, cancel).await?;
        Ok(audio)
    }

    /// Wrap a transcript in the configured prompt template
    #[must_use]
    pub fn prompt_for(&self, transcript: &str) -> String {
        match &self.config.prompt_template {
            Some(template) if template.contains("{text}") => template.replace("{text}", transcript),
            Some(template) => format!("{template}\n\n{transcript}"),
            None => transcript.to_string(),
        }
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary
#[must_use]
pub fn truncate_reply(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
