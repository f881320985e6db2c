//! Per-connection orchestrator: the read-side dispatch, the ASR relay loop,
//! and hint/follow-up token streaming.
//!
//! Transport is abstracted behind [`OutboundSink`] so this module never
//! touches a concrete WebSocket type — the adapter crate wraps the real
//! connection and drives [`Session::handle_binary`]/[`Session::handle_text`]
//! from its own read loop.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::asr::AsrProvider;
use crate::config::{BACKPRESSURE_WARNING_INTERVAL, HINT_GATE_INTERVAL, TOKEN_STREAM_PACE};
use crate::hint::{Answer, HintService};
use crate::metrics::Metrics;
use crate::ocr::OcrStore;
use crate::protocol::{DownMessage, UpMessage, AUDIO_BACKPRESSURE_CODE, HINT_TTL_MS};
use crate::rate_gate::RateGate;

/// Everything a session needs to deliver a message to its client. The
/// adapter crate implements this over the real WebSocket sender half;
/// failures are logged by the implementation and never propagate — a
/// write timeout is not fatal to the session.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, message: DownMessage);
}

struct SessionState {
    ocr: OcrStore,
    listening: bool,
}

/// The per-client orchestrator. Constructed once per accepted connection,
/// destroyed when the read loop exits.
pub struct Session {
    id: Uuid,
    sink: Arc<dyn OutboundSink>,
    asr: Option<Arc<dyn AsrProvider>>,
    hint_service: Arc<dyn HintService>,
    metrics: Arc<Metrics>,
    hint_gate: RateGate,
    warning_gate: RateGate,
    state: Mutex<SessionState>,
    teardown_started: AtomicBool,
}

impl Session {
    /// Construct a session, send the initial `state` message, and increment
    /// the active-session gauge. Mirrors the Startup sequence: disable
    /// per-message compression happens at the transport layer, before this
    /// is called.
    pub async fn start(
        sink: Arc<dyn OutboundSink>,
        asr: Option<Arc<dyn AsrProvider>>,
        hint_service: Arc<dyn HintService>,
        metrics: Arc<Metrics>,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            sink,
            asr,
            hint_service,
            metrics,
            hint_gate: RateGate::new(HINT_GATE_INTERVAL),
            warning_gate: RateGate::new(BACKPRESSURE_WARNING_INTERVAL),
            state: Mutex::new(SessionState {
                ocr: OcrStore::new(),
                listening: false,
            }),
            teardown_started: AtomicBool::new(false),
        });
        session.sink.send(DownMessage::State { listening: false }).await;
        session.metrics.session_started();
        session
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn listening(&self) -> bool {
        self.state.lock().unwrap().listening
    }

    /// Handle one binary (PCM) frame.
    pub async fn handle_binary(&self, bytes: &[u8]) {
        self.metrics.pcm_received();
        let Some(asr) = &self.asr else { return };
        if asr.write_pcm(bytes).await {
            return;
        }
        self.metrics.pcm_dropped();
        if self.warning_gate.allow() {
            tracing::warn!(session_id = %self.id, "dropping PCM frame under backpressure");
            self.sink
                .send(DownMessage::Warning {
                    code: AUDIO_BACKPRESSURE_CODE.to_string(),
                    msg: "Audio quality degraded (dropping frames).".to_string(),
                })
                .await;
        }
    }

    /// Handle one text frame, already known to be valid UTF-8.
    pub async fn handle_text(&self, raw: &str) {
        let msg: UpMessage = match serde_json::from_str(raw) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "malformed client message");
                return;
            }
        };

        match msg.msg_type.to_lowercase().as_str() {
            "hello" => {
                self.sink
                    .send(DownMessage::State {
                        listening: self.listening(),
                    })
                    .await;
            }
            "frame_meta" => {
                let tokens = msg.ocr.unwrap_or_default();
                let first = msg.first.unwrap_or(false);
                let last = msg.last.unwrap_or(false);
                self.state.lock().unwrap().ocr.update(tokens, first, last);
            }
            "stop" => {
                self.state.lock().unwrap().listening = false;
                if let Some(asr) = &self.asr {
                    asr.flush().await;
                }
                self.sink
                    .send(DownMessage::State { listening: false })
                    .await;
            }
            "transcript" => self.handle_transcript(msg).await,
            other => {
                tracing::debug!(msg_type = other, "ignoring unrecognized message type");
            }
        }
    }

    async fn handle_transcript(&self, msg: UpMessage) {
        let Some(text) = msg.text.filter(|t| !t.is_empty()) else {
            tracing::warn!("transcript message missing non-empty text");
            return;
        };
        let is_final = msg.is_final.unwrap_or(false);

        self.sink
            .send(if is_final {
                DownMessage::Final { text: text.clone() }
            } else {
                DownMessage::Partial { text: text.clone() }
            })
            .await;

        if is_final && self.hint_gate.allow() {
            self.spawn_hint_task(text);
        }
    }

    /// Drain ASR events concurrently with the read loop until the provider's
    /// stream closes. Intended to be spawned as its own task.
    pub async fn run_asr_relay(self: Arc<Self>) {
        let Some(asr) = self.asr.clone() else { return };
        while let Some(event) = asr.next_event().await {
            if event.is_final() {
                self.metrics.asr_final();
            } else {
                self.metrics.asr_partial();
            }
            self.sink
                .send(if event.is_final() {
                    DownMessage::Final {
                        text: event.text.clone(),
                    }
                } else {
                    DownMessage::Partial {
                        text: event.text.clone(),
                    }
                })
                .await;

            if event.is_final() && self.hint_gate.allow() {
                self.spawn_hint_task(event.text);
            }
        }
    }

    fn spawn_hint_task(self: &Arc<Self>, transcript: String) {
        if self.teardown_started.load(Ordering::SeqCst) {
            return;
        }
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let snapshot = session.state.lock().unwrap().ocr.snapshot();
            match session.hint_service.micro(&transcript, &snapshot).await {
                Some(answer) => session.stream_answer(answer).await,
                None => {
                    tracing::warn!(session_id = %session.id, "hint service returned no answer");
                    session.metrics.hint_error();
                }
            }
        });
    }

    async fn stream_answer(&self, answer: Answer) {
        if !answer.answer.trim().is_empty() {
            self.stream_tokens(&answer.answer, false).await;
            self.metrics.hint_emitted();
        }
        if !answer.follow_up.trim().is_empty() {
            self.stream_tokens(&answer.follow_up, true).await;
            self.metrics.followup_emitted();
        }
    }

    async fn stream_tokens(&self, text: &str, is_followup: bool) {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for i in 1..=tokens.len() {
            let prefix = tokens[..i].join(" ");
            self.sink
                .send(if is_followup {
                    DownMessage::FollowupPartial { text: prefix }
                } else {
                    DownMessage::HintPartial { text: prefix }
                })
                .await;
            tokio::time::sleep(TOKEN_STREAM_PACE).await;
        }
        self.sink
            .send(if is_followup {
                DownMessage::Followup {
                    text: text.to_string(),
                    ttl_ms: HINT_TTL_MS,
                }
            } else {
                DownMessage::Hint {
                    text: text.to_string(),
                    ttl_ms: HINT_TTL_MS,
                }
            })
            .await;
    }

    /// One-shot teardown: flush and close the ASR provider, then decrement
    /// the active-session gauge. Closing the transport itself is the
    /// caller's responsibility once its read loop returns.
    pub async fn teardown(&self) {
        if self.teardown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(asr) = &self.asr {
            asr.flush().await;
            asr.close().await;
        }
        self.metrics.session_ended();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::FallbackHintService;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        sent: StdMutex<Vec<DownMessage>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<DownMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OutboundSink for RecordingSink {
        async fn send(&self, message: DownMessage) {
            self.sent.lock().unwrap().push(message);
        }
    }

    async fn new_test_session(sink: Arc<RecordingSink>) -> Arc<Session> {
        Session::start(
            sink,
            None,
            Arc::new(FallbackHintService::new()),
            Metrics::new(),
        )
        .await
    }

    #[tokio::test]
    async fn hello_echoes_current_listening_state() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session.handle_text(r#"{"type":"hello"}"#).await;

        let messages = sink.messages();
        assert_eq!(messages[0], DownMessage::State { listening: false });
        assert_eq!(messages[1], DownMessage::State { listening: false });
    }

    #[tokio::test]
    async fn transcript_final_without_text_is_ignored() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session
            .handle_text(r#"{"type":"transcript","final":true}"#)
            .await;
        // Only the startup `state` message was sent.
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn transcript_partial_produces_no_hint() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session
            .handle_text(r#"{"type":"transcript","text":"discussing the budget","final":false}"#)
            .await;
        let messages = sink.messages();
        assert!(matches!(messages.last().unwrap(), DownMessage::Partial { .. }));
    }

    #[tokio::test]
    async fn transcript_final_streams_hint_then_followup() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session
            .handle_text(
                r#"{"type":"transcript","text":"We can probably meet Friday to discuss the budget","final":true}"#,
            )
            .await;

        // Hint streaming runs on a spawned task; give it time to finish.
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

        let messages = sink.messages();
        assert!(messages
            .iter()
            .any(|m| matches!(m, DownMessage::Final { .. })));
        let hint_index = messages
            .iter()
            .position(|m| matches!(m, DownMessage::Hint { .. }))
            .expect("hint emitted");
        let followup_index = messages
            .iter()
            .position(|m| matches!(m, DownMessage::Followup { .. }))
            .expect("followup emitted");
        assert!(hint_index < followup_index);
    }

    #[tokio::test]
    async fn frame_meta_then_transcript_uses_ocr_context() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session
            .handle_text(r#"{"type":"frame_meta","ocr":["architecture"],"first":true}"#)
            .await;
        session
            .handle_text(r#"{"type":"transcript","text":"let's look at this","final":true}"#)
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let messages = sink.messages();
        assert!(messages
            .iter()
            .any(|m| matches!(m, DownMessage::HintPartial { .. })));
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let sink = RecordingSink::new();
        let session = new_test_session(Arc::clone(&sink)).await;
        session.teardown().await;
        session.teardown().await;
    }
}
