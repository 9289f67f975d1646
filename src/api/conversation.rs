//! WebSocket endpoint for real-time voice conversations
//!
//! The upgrade is not gated by credentials; voice practice is anonymous.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt, future};

use super::ApiState;
use crate::session::{InboundFrame, OutboundMessage, SessionCoordinator, SessionEnd, WireFrame};

/// Build conversation router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/conversation", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one conversation session over an upgraded socket
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (sender, receiver) = socket.split();

    let sink = sender.with(|message: OutboundMessage| {
        future::ready(Ok::<_, axum::Error>(to_ws_message(message)))
    });
    let frames = receiver.filter_map(|message| future::ready(from_ws_message(message)));

    let processor = state.gateways.turn_processor(state.turn.clone());
    let coordinator = SessionCoordinator::new(sink, processor, state.session.clone());
    let session_id = coordinator.session_id();

    match coordinator.run(frames).await {
        SessionEnd::Timeout | SessionEnd::ClientClosed => {
            tracing::debug!(session_id = %session_id, "WebSocket disconnected");
        }
        SessionEnd::ReadError(error) | SessionEnd::WriteError(error) => {
            tracing::debug!(session_id = %session_id, error = %error, "WebSocket dropped");
        }
    }
}

fn to_ws_message(message: OutboundMessage) -> Message {
    match message.into_wire() {
        WireFrame::Text(text) => Message::Text(text.into()),
        WireFrame::Binary(audio) => Message::Binary(audio.into()),
    }
}

/// Map a socket message to an inbound frame; ping/pong are handled by axum
fn from_ws_message(
    message: Result<Message, axum::Error>,
) -> Option<Result<InboundFrame, axum::Error>> {
    match message {
        Ok(Message::Binary(data)) => Some(Ok(InboundFrame::Audio(data.to_vec()))),
        Ok(Message::Text(text)) => Some(Ok(InboundFrame::Text(text.to_string()))),
        Ok(Message::Close(_)) => Some(Ok(InboundFrame::Close)),
        Ok(Message::Ping(_) | Message::Pong(_)) => None,
        Err(e) => Some(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_maps_to_audio() {
        let frame = from_ws_message(Ok(Message::Binary(vec![1, 2].into())));
        assert!(matches!(frame, Some(Ok(InboundFrame::Audio(ref a))) if a == &[1, 2]));
    }

    #[test]
    fn text_maps_to_text() {
        let frame = from_ws_message(Ok(Message::Text(r#"{"type":"end_of_speech"}"#.into())));
        assert!(matches!(frame, Some(Ok(InboundFrame::Text(_)))));
    }

    #[test]
    fn ping_is_skipped() {
        assert!(from_ws_message(Ok(Message::Ping(Vec::new().into()))).is_none());
    }

    #[test]
    fn close_maps_to_close() {
        assert!(matches!(
            from_ws_message(Ok(Message::Close(None))),
            Some(Ok(InboundFrame::Close))
        ));
    }

    #[test]
    fn outbound_status_is_text() {
        let message = to_ws_message(OutboundMessage::Processing);
        assert!(matches!(message, Message::Text(ref t) if t.as_str() == r#"{"status":"processing"}"#));
    }
}
