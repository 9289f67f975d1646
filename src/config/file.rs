//! TOML configuration file loading
//!
//! Supports `~/.config/lissan/speaking/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SpeakingConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Conversation session configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Speech-to-text provider
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Chat completion provider
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech synthesis provider
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Turn processing rules
    #[serde(default)]
    pub turn: TurnFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Conversation session configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Wall-clock session limit in seconds
    pub timeout_secs: Option<u64>,

    /// Upper bound on buffered audio per turn
    pub max_buffer_bytes: Option<usize>,

    /// Write deadline for the final timeout notice, in seconds
    pub close_write_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub groq: Option<String>,
    pub huggingface: Option<String>,
    pub unreal_speech: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub url: Option<String>,
    pub content_type: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_padding_secs: Option<u64>,
    pub max_retry_delay_secs: Option<u64>,
}

/// Chat completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub url: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    pub voice_id: Option<String>,
    pub bitrate: Option<String>,
    pub speed: Option<String>,
}

/// Turn processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct TurnFileConfig {
    /// Replies longer than this are cut before synthesis
    pub max_reply_chars: Option<usize>,

    /// Template wrapping the transcript, with a `{text}` placeholder
    pub prompt_template: Option<String>,
}

/// Load the TOML config file from `SPEAKING_CONFIG` or the standard path
///
/// Returns `SpeakingConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SpeakingConfigFile {
    let path = std::env::var("SPEAKING_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    let Some(path) = path else {
        return SpeakingConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> SpeakingConfigFile {
    if !path.exists() {
        return SpeakingConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SpeakingConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SpeakingConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lissan/speaking/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("lissan")
            .join("speaking")
            .join("config.toml")
    })
}
