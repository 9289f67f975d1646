//! Conversation wire protocol
//!
//! Client → server: binary audio chunks and `{"type":"end_of_speech"}`.
//! Server → client: `{"status":"processing"}`, binary reply audio, and
//! `{"type":"end","reason":"..."}` when the session limit is reached.

use serde::{Deserialize, Serialize};

/// A frame read from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Raw audio chunk
    Audio(Vec<u8>),
    /// UTF-8 text, expected to hold a control message
    Text(String),
    /// Client-initiated close
    Close,
}

/// Control message carried in a text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The user stopped speaking; process the buffered audio
    EndOfSpeech,
    /// Any other `type`; ignored
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Decode a text frame, returning `None` for anything that is not a control object
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// A message the coordinator writes to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A turn has started processing
    Processing,
    /// Synthesized reply audio for one turn
    Audio(Vec<u8>),
    /// The session is being closed by the server
    End { reason: String },
}

/// Encoded form of an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: &'a str,
}

#[derive(Serialize)]
struct EndNotice<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    reason: &'a str,
}

impl OutboundMessage {
    /// Encode for the socket
    #[must_use]
    pub fn into_wire(self) -> WireFrame {
        match self {
            Self::Processing => WireFrame::Text(to_json(&StatusUpdate {
                status: "processing",
            })),
            Self::Audio(audio) => WireFrame::Binary(audio),
            Self::End { reason } => WireFrame::Text(to_json(&EndNotice {
                kind: "end",
                reason: &reason,
            })),
        }
    }
}

// Both payloads are plain string structs; serialization cannot fail.
fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
