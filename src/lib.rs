//! Speaking Gateway - Real-time voice conversation gateway
//!
//! This library provides the core functionality for the speaking gateway:
//! - Provider gateways for speech-to-text, reply generation and speech synthesis
//! - The turn processor that chains them into one spoken reply
//! - The session coordinator that runs a conversation over a WebSocket
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Browser client                       │
//! │        audio chunks  │  {"type":"end_of_speech"}     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ WebSocket /ws/conversation
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Coordinator                    │
//! │   buffer  │  turn state  │  3 minute deadline       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Turn Processor                       │
//! │   STT (Whisper)  →  LLM (Groq)  →  TTS (Unreal)     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
