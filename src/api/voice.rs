//! One-shot voice endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::ApiState;
use crate::voice::{SttError, SynthesisError};

/// Longest text accepted by the synthesis endpoint
pub const MAX_SYNTHESIS_CHARS: usize = 1_000;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/synthesize", post(synthesize))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub stt_available: bool,
    pub tts_available: bool,
    pub session_timeout_secs: u64,
    pub max_reply_chars: usize,
}

/// Get voice capabilities
async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    Json(VoiceCapabilities {
        stt_available: true,
        tts_available: true,
        session_timeout_secs: state.session.timeout.as_secs(),
        max_reply_chars: state.turn.max_reply_chars,
    })
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe a raw audio body
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, VoiceError> {
    if body.is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data"));
    }

    let text = state
        .gateways
        .stt
        .transcribe(&body, &CancellationToken::new())
        .await
        .map_err(VoiceError::Transcription)?;

    Ok(Json(TranscribeResponse {
        text: text.trim().to_string(),
    }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesize text to speech
///
/// Returns audio in MP3 format
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, VoiceError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(VoiceError::BadRequest("Empty text"));
    }
    if text.chars().count() > MAX_SYNTHESIS_CHARS {
        return Err(VoiceError::BadRequest("Text too long"));
    }

    let audio = state
        .gateways
        .tts
        .synthesize(text, &CancellationToken::new())
        .await
        .map_err(VoiceError::Synthesis)?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    BadRequest(&'static str),
    Transcription(SttError),
    Synthesis(SynthesisError),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::Transcription(e @ SttError::ModelUnavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", e.to_string())
            }
            Self::Transcription(e) => {
                tracing::warn!(error = %e, "transcription failed");
                (StatusCode::BAD_GATEWAY, "transcription_failed", e.to_string())
            }
            Self::Synthesis(e) => {
                tracing::warn!(error = %e, "synthesis failed");
                (StatusCode::BAD_GATEWAY, "synthesis_failed", e.to_string())
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
