//! WebSocket upgrade handler for the coaching session.
//!
//! `GET /ws` upgrades to a bidirectional WebSocket: binary frames carry PCM
//! audio, text frames carry the control/transcript protocol. One [`Session`]
//! is constructed per connection and destroyed when the read loop exits.

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn, Instrument};

use coach_core::asr::build_asr_provider;
use coach_core::config::{READ_IDLE_TIMEOUT, WRITE_TIMEOUT};
use coach_core::protocol::DownMessage;
use coach_core::session::{OutboundSink, Session};

use crate::state::AppState;

const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// `GET /ws` — WebSocket upgrade endpoint.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_BYTES)
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serializes outbound writes through the WebSocket's single-writer sender
/// half; a write that exceeds [`WRITE_TIMEOUT`] is logged and dropped, not
/// fatal to the session.
struct WsSink {
    sender: AsyncMutex<SplitSink<WebSocket, Message>>,
}

#[async_trait]
impl OutboundSink for WsSink {
    async fn send(&self, message: DownMessage) {
        let Ok(json) = serde_json::to_string(&message) else {
            warn!("failed to serialize outbound message");
            return;
        };
        let mut sender = self.sender.lock().await;
        match tokio::time::timeout(WRITE_TIMEOUT, sender.send(Message::Text(json))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "websocket write failed"),
            Err(_) => warn!("websocket write timed out"),
        }
    }
}

impl WsSink {
    /// One-shot normal-closure frame, sent after the session has torn down.
    async fn close_normal(&self) {
        let frame = Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "bye".into(),
        }));
        let mut sender = self.sender.lock().await;
        match tokio::time::timeout(WRITE_TIMEOUT, sender.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "websocket close frame failed"),
            Err(_) => warn!("websocket close frame timed out"),
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    let ws_sink = Arc::new(WsSink {
        sender: AsyncMutex::new(sender),
    });
    let sink: Arc<dyn OutboundSink> = Arc::clone(&ws_sink);

    let asr = build_asr_provider(&state.config, Arc::clone(&state.metrics));
    let session = Session::start(
        sink,
        asr,
        Arc::clone(&state.hint_service),
        Arc::clone(&state.metrics),
    )
    .await;

    let span = tracing::info_span!("session", session_id = %session.id());
    drive_session(session, receiver, ws_sink).instrument(span).await;
}

async fn drive_session(
    session: Arc<Session>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    ws_sink: Arc<WsSink>,
) {
    info!("session opened");

    let relay_handle = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.run_asr_relay().await })
    };

    loop {
        let next = tokio::time::timeout(READ_IDLE_TIMEOUT, receiver.next()).await;
        let message = match next {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(err))) => {
                warn!(error = %err, "websocket read error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!("read idle timeout elapsed, closing session");
                break;
            }
        };

        match message {
            Message::Binary(data) => session.handle_binary(&data).await,
            Message::Text(text) => session.handle_text(&text).await,
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    session.teardown().await;
    relay_handle.abort();
    ws_sink.close_normal().await;

    info!("session closed");
}
