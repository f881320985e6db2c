//! Streaming ASR provider and its HTTP transport.
//!
//! The SSE-chunk parsing loop uses a `BytesMut` line buffer fed by a
//! `reqwest` byte stream, scanning for `data: ` lines and a `[DONE]`
//! terminator.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use super::{AsrEvent, AsrProvider, construction_error};
use crate::config::{AsrRemoteConfig, ASR_BUFFER_SOFT_CAP_BYTES, ASR_STREAM_TIMEOUT};
use crate::error::CoreError;
use crate::metrics::Metrics;

pub type BoxByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport errors from the external ASR service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Outbound capability needed by [`StreamingAsrProvider`] (and reused by
/// [`super::BufferedAsrProvider`] for its whole-utterance mode). Abstracted
/// behind a trait so tests can substitute a canned transport instead of
/// making a live network call.
#[async_trait]
pub trait AsrTransport: Send + Sync {
    /// Whole-utterance transcription: one request, one response.
    async fn transcribe_once(&self, pcm: &[u8]) -> Result<String, TransportError>;

    /// Open a server-sent-events streaming transcription request. The
    /// returned stream yields raw bytes as they arrive from upstream.
    async fn open_stream(&self, pcm: &[u8]) -> Result<BoxByteStream, TransportError>;
}

/// Production transport: PCM forwarded as `audio/pcm;rate=16000` mono,
/// base64-encoded in the JSON body.
pub struct ReqwestAsrTransport {
    client: reqwest::Client,
    base_url: String,
    model: Option<String>,
    api_key: Option<String>,
}

impl ReqwestAsrTransport {
    pub fn new(config: &AsrRemoteConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(ASR_STREAM_TIMEOUT)
            .build()
            .map_err(|e| construction_error(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://asr.invalid/v1".to_string()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn body(&self, pcm: &[u8]) -> serde_json::Value {
        use base64::Engine;
        serde_json::json!({
            "audio": base64::engine::general_purpose::STANDARD.encode(pcm),
            "mimeType": "audio/pcm;rate=16000",
            "model": self.model,
        })
    }

    fn request(&self, path: &str, pcm: &[u8]) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&self.body(pcm));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[async_trait]
impl AsrTransport for ReqwestAsrTransport {
    async fn transcribe_once(&self, pcm: &[u8]) -> Result<String, TransportError> {
        let resp = self
            .request("/transcribe", pcm)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;
        value["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidBody("missing `text` field".into()))
    }

    async fn open_stream(&self, pcm: &[u8]) -> Result<BoxByteStream, TransportError> {
        let resp = self
            .request("/transcribe/stream", pcm)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Request(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// One SSE chunk from the streaming ASR upstream: a candidate transcript
/// and an optional finish reason. Any finish reason other than
/// `"incomplete"` is terminal.
#[derive(Debug, Clone, serde::Deserialize, Default)]
struct SseChunk {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

fn is_terminal(finish_reason: Option<&str>) -> bool {
    matches!(finish_reason, Some(r) if r != "incomplete")
}

/// Extracts `partial`/`final` events from a raw SSE byte stream: events
/// fire in upstream order, each partial strictly different from the last,
/// with a trailing synthesized final if the stream ends mid-utterance with
/// a non-empty partial already observed.
async fn drive_sse_stream(
    mut stream: BoxByteStream,
    tx: mpsc::Sender<AsrEvent>,
    metrics: &Metrics,
) {
    let mut buf = BytesMut::new();
    let mut last_partial: Option<String> = None;
    let mut closed_with_final = false;

    'outer: loop {
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = buf.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line);
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(':') {
                continue;
            }
            let Some(data) = trimmed.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                break 'outer;
            }
            let Ok(chunk) = serde_json::from_str::<SseChunk>(data) else {
                continue;
            };
            if chunk.text != last_partial.clone().unwrap_or_default() && !chunk.text.is_empty() {
                if is_terminal(chunk.finish_reason.as_deref()) {
                    let _ = tx.try_send(AsrEvent::final_(chunk.text.clone()));
                    closed_with_final = true;
                } else {
                    let _ = tx.try_send(AsrEvent::partial(chunk.text.clone()));
                }
                last_partial = Some(chunk.text);
            } else if is_terminal(chunk.finish_reason.as_deref()) && !closed_with_final {
                let text = last_partial.clone().unwrap_or_default();
                let _ = tx.try_send(AsrEvent::final_(text));
                closed_with_final = true;
            }
        }

        match stream.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            Some(Err(err)) => {
                tracing::warn!(error = %err, "streaming ASR upstream error");
                metrics.asr_error();
                break;
            }
            None => break,
        }
    }

    if !closed_with_final {
        if let Some(text) = last_partial {
            if !text.is_empty() {
                let _ = tx.try_send(AsrEvent::final_(text));
            }
        }
    }
}

/// Streaming SSE-backed ASR provider, the default production backend.
pub struct StreamingAsrProvider {
    transport: Arc<dyn AsrTransport>,
    buffer: Mutex<Vec<u8>>,
    buffer_cap_bytes: usize,
    event_rx: Mutex<mpsc::Receiver<AsrEvent>>,
    event_tx: mpsc::Sender<AsrEvent>,
    dropped: AtomicI64,
    in_flight: Arc<AtomicUsize>,
    inflight_notify: Arc<tokio::sync::Notify>,
    closed: std::sync::atomic::AtomicBool,
    metrics: Arc<Metrics>,
}

impl StreamingAsrProvider {
    #[must_use]
    pub fn new(transport: Arc<dyn AsrTransport>, _pcm_buffer_frames: usize, metrics: Arc<Metrics>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(4);
        Self {
            transport,
            buffer: Mutex::new(Vec::new()),
            buffer_cap_bytes: ASR_BUFFER_SOFT_CAP_BYTES,
            event_rx: Mutex::new(event_rx),
            event_tx,
            dropped: AtomicI64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            inflight_notify: Arc::new(tokio::sync::Notify::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
            metrics,
        }
    }

    async fn take_buffer(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock().await)
    }

    fn spawn_batch(&self, batch: Vec<u8>) {
        if batch.is_empty() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let tx = self.event_tx.clone();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let notify = Arc::clone(&self.inflight_notify);
        let in_flight = Arc::clone(&self.in_flight);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            match transport.open_stream(&batch).await {
                Ok(stream) => drive_sse_stream(stream, tx, &metrics).await,
                Err(err) => {
                    tracing::warn!(error = %err, "streaming ASR request failed");
                    metrics.asr_error();
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            notify.notify_waiters();
        });
    }
}

#[async_trait]
impl AsrProvider for StreamingAsrProvider {
    async fn write_pcm(&self, bytes: &[u8]) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut buf = self.buffer.lock().await;
        if buf.len() + bytes.len() > self.buffer_cap_bytes {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        buf.extend_from_slice(bytes);
        true
    }

    async fn next_event(&self) -> Option<AsrEvent> {
        self.event_rx.lock().await.recv().await
    }

    fn dropped(&self) -> i64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn flush(&self) {
        let batch = self.take_buffer().await;
        self.spawn_batch(batch);
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let batch = self.take_buffer().await;
        self.spawn_batch(batch);
        loop {
            let notified = self.inflight_notify.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
        self.event_rx.lock().await.close();
    }
}
