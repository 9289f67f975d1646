//! Configuration management for the speaking gateway
//!
//! Values are layered env > TOML file > defaults. Provider credentials are
//! held as [`SecretString`] and never printed by `Debug`.

pub mod file;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};
use file::SpeakingConfigFile;

/// Default API port
pub const DEFAULT_PORT: u16 = 8080;

/// Default wall-clock limit for one conversation
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(180);

/// Default bound on buffered audio per session
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Default reply length cap applied before synthesis
pub const DEFAULT_MAX_REPLY_CHARS: usize = 100;

const DEFAULT_STT_URL: &str =
    "https://api-inference.huggingface.co/models/openai/whisper-large-v3";
const DEFAULT_LLM_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a conversation. \
     Be concise and conversational in your responses.";
const DEFAULT_TTS_URL: &str = "https://api.v8.unrealspeech.com/stream";

/// Speaking gateway configuration
#[derive(Debug)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Conversation session limits
    pub session: SessionConfig,

    /// Provider credentials
    pub api_keys: ApiKeys,

    /// Speech-to-text provider
    pub stt: SttConfig,

    /// Chat completion provider
    pub llm: LlmConfig,

    /// Speech synthesis provider
    pub tts: TtsConfig,

    /// Turn processing rules
    pub turn: TurnConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
}

/// Conversation session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wall-clock limit measured from connection open
    pub timeout: Duration,

    /// Upper bound on buffered audio; chunks past it are dropped
    pub max_buffer_bytes: usize,

    /// Write deadline for the final timeout notice
    pub close_write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            close_write_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Reason string sent to the client when the session limit is reached
    ///
    /// Whole minutes render as `3_minute_limit`; anything else falls back to seconds.
    #[must_use]
    pub fn timeout_reason(&self) -> String {
        let secs = self.timeout.as_secs();
        if secs >= 60 && secs % 60 == 0 {
            format!("{}_minute_limit", secs / 60)
        } else {
            format!("{secs}_second_limit")
        }
    }
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// Groq key (chat completions)
    pub groq: Option<SecretString>,

    /// Hugging Face key (Whisper inference)
    pub huggingface: Option<SecretString>,

    /// Unreal Speech key (synthesis)
    pub unreal_speech: Option<SecretString>,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Inference endpoint receiving the raw audio body
    pub url: String,

    /// Content type of the uploaded audio
    pub content_type: String,

    /// Attempts allowed while the model is warming up
    pub max_attempts: u32,

    /// Added to the provider's estimated load time before retrying
    pub retry_padding: Duration,

    /// Cap on a single warm-up wait
    pub max_retry_delay: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STT_URL.to_string(),
            content_type: "audio/ogg".to_string(),
            max_attempts: 3,
            retry_padding: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub url: String,

    /// Model identifier
    pub model: String,

    /// System message sent ahead of every prompt
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LLM_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Streaming synthesis endpoint
    pub url: String,

    /// Voice identifier (required)
    pub voice_id: Option<String>,

    /// Output bitrate
    pub bitrate: String,

    /// Playback speed offset, as the provider expects it
    pub speed: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.to_string(),
            voice_id: None,
            bitrate: "192k".to_string(),
            speed: "0".to_string(),
        }
    }
}

/// Turn processing configuration
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Replies are cut to this many characters before synthesis
    pub max_reply_chars: usize,

    /// Optional template wrapping the transcript (`{text}` placeholder)
    pub prompt_template: Option<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_reply_chars: DEFAULT_MAX_REPLY_CHARS,
            prompt_template: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the optional TOML file
    ///
    /// Does not check credentials; call [`Config::validate`] before serving.
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Layer an environment lookup over a parsed config file
    pub fn resolve<F>(fc: SpeakingConfigFile, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str, file: Option<String>| {
            non_empty(key)
                .or(file)
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from)
        };

        let server = ServerConfig {
            port: parse_env(&env, "SPEAKING_PORT")
                .or_else(|| parse_env(&env, "PORT"))
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        let session_defaults = SessionConfig::default();
        let session = SessionConfig {
            timeout: parse_env(&env, "SPEAKING_SESSION_TIMEOUT_SECS")
                .or(fc.session.timeout_secs)
                .map_or(session_defaults.timeout, Duration::from_secs),
            max_buffer_bytes: parse_env(&env, "SPEAKING_MAX_BUFFER_BYTES")
                .or(fc.session.max_buffer_bytes)
                .unwrap_or(session_defaults.max_buffer_bytes),
            close_write_timeout: fc
                .session
                .close_write_timeout_secs
                .map_or(session_defaults.close_write_timeout, Duration::from_secs),
        };

        let api_keys = ApiKeys {
            groq: secret("GROQ_API_KEY", fc.api_keys.groq),
            huggingface: secret("HF_API_KEY", fc.api_keys.huggingface),
            unreal_speech: secret("UNREAL_SPEECH_API_KEY", fc.api_keys.unreal_speech),
        };

        let stt_defaults = SttConfig::default();
        let stt = SttConfig {
            url: non_empty("SPEAKING_STT_URL")
                .or(fc.stt.url)
                .unwrap_or(stt_defaults.url),
            content_type: fc.stt.content_type.unwrap_or(stt_defaults.content_type),
            max_attempts: fc
                .stt
                .max_attempts
                .unwrap_or(stt_defaults.max_attempts)
                .max(1),
            retry_padding: fc
                .stt
                .retry_padding_secs
                .map_or(stt_defaults.retry_padding, Duration::from_secs),
            max_retry_delay: fc
                .stt
                .max_retry_delay_secs
                .map_or(stt_defaults.max_retry_delay, Duration::from_secs),
        };

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            url: non_empty("SPEAKING_LLM_URL")
                .or(fc.llm.url)
                .unwrap_or(llm_defaults.url),
            model: non_empty("SPEAKING_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(llm_defaults.model),
            system_prompt: fc.llm.system_prompt.unwrap_or(llm_defaults.system_prompt),
        };

        let tts_defaults = TtsConfig::default();
        let tts = TtsConfig {
            url: non_empty("SPEAKING_TTS_URL")
                .or(fc.tts.url)
                .unwrap_or(tts_defaults.url),
            voice_id: non_empty("UNREAL_SPEECH_VOICE_ID")
                .or(fc.tts.voice_id)
                .filter(|v| !v.trim().is_empty()),
            bitrate: fc.tts.bitrate.unwrap_or(tts_defaults.bitrate),
            speed: fc.tts.speed.unwrap_or(tts_defaults.speed),
        };

        let turn = TurnConfig {
            max_reply_chars: parse_env(&env, "SPEAKING_MAX_REPLY_CHARS")
                .or(fc.turn.max_reply_chars)
                .unwrap_or(DEFAULT_MAX_REPLY_CHARS),
            prompt_template: fc.turn.prompt_template,
        };

        Self {
            server,
            session,
            api_keys,
            stt,
            llm,
            tts,
            turn,
        }
    }

    /// Check that every provider credential is present
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` listing every missing key
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.api_keys.groq.is_none() {
            missing.push("GROQ_API_KEY");
        }
        if self.api_keys.huggingface.is_none() {
            missing.push("HF_API_KEY");
        }
        if self.api_keys.unreal_speech.is_none() {
            missing.push("UNREAL_SPEECH_API_KEY");
        }
        if self.tts.voice_id.is_none() {
            missing.push("UNREAL_SPEECH_VOICE_ID");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "missing provider credentials: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Copy a secret into a fresh `SecretString` for a client that owns its key
#[must_use]
pub fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

fn parse_env<F, T>(env: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env_or_file() {
        let config = Config::resolve(SpeakingConfigFile::default(), env_from(&[]));

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.session.timeout, Duration::from_secs(180));
        assert_eq!(config.turn.max_reply_chars, 100);
        assert_eq!(config.stt.max_attempts, 3);
        assert_eq!(config.stt.content_type, "audio/ogg");
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert!(config.api_keys.groq.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = SpeakingConfigFile::default();
        fc.server.port = Some(9000);
        fc.api_keys.groq = Some("file-key".to_string());
        fc.turn.max_reply_chars = Some(150);

        let config = Config::resolve(
            fc,
            env_from(&[("PORT", "7000"), ("GROQ_API_KEY", "env-key")]),
        );

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.turn.max_reply_chars, 150);
        assert_eq!(
            config.api_keys.groq.as_ref().map(ExposeSecret::expose_secret),
            Some("env-key")
        );
    }

    #[test]
    fn speaking_port_wins_over_port() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[("PORT", "7000"), ("SPEAKING_PORT", "7100")]),
        );
        assert_eq!(config.server.port, 7100);
    }

    #[test]
    fn unparseable_env_value_is_ignored() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[("SPEAKING_SESSION_TIMEOUT_SECS", "soon")]),
        );
        assert_eq!(config.session.timeout, DEFAULT_SESSION_TIMEOUT);
    }

    #[test]
    fn empty_env_key_counts_as_missing() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[("HF_API_KEY", "  ")]),
        );
        assert!(config.api_keys.huggingface.is_none());
    }

    #[test]
    fn validate_lists_every_missing_credential() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[("GROQ_API_KEY", "g")]),
        );

        let err = config.validate().unwrap_err().to_string();
        assert!(!err.contains("GROQ_API_KEY"));
        assert!(err.contains("HF_API_KEY"));
        assert!(err.contains("UNREAL_SPEECH_API_KEY"));
        assert!(err.contains("UNREAL_SPEECH_VOICE_ID"));
    }

    #[test]
    fn validate_passes_with_all_credentials() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[
                ("GROQ_API_KEY", "g"),
                ("HF_API_KEY", "h"),
                ("UNREAL_SPEECH_API_KEY", "u"),
                ("UNREAL_SPEECH_VOICE_ID", "Scarlett"),
            ]),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn timeout_reason_formats() {
        let mut session = SessionConfig::default();
        assert_eq!(session.timeout_reason(), "3_minute_limit");

        session.timeout = Duration::from_secs(45);
        assert_eq!(session.timeout_reason(), "45_second_limit");

        session.timeout = Duration::from_secs(90);
        assert_eq!(session.timeout_reason(), "90_second_limit");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = Config::resolve(
            SpeakingConfigFile::default(),
            env_from(&[("GROQ_API_KEY", "super-secret-value")]),
        );
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
    }
}
