//! ASR provider capability.
//!
//! The [`AsrProvider`] trait abstracts over transcription backends; callers
//! hold a `dyn AsrProvider` and never discriminate on variant. Sync methods
//! stay plain `fn`; methods that touch the network are `async_trait`.

mod buffered;
mod stub;
mod streaming;

pub use buffered::BufferedAsrProvider;
pub use stub::StubAsrProvider;
pub use streaming::{AsrTransport, ReqwestAsrTransport, StreamingAsrProvider};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, AsrProviderKind};
use crate::error::CoreError;
use crate::metrics::Metrics;

/// Whether an [`AsrEvent`] is a `partial` or a `final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrEventKind {
    Partial,
    Final,
}

/// A single ASR event. `kind == Final` iff the utterance has closed.
#[derive(Debug, Clone, PartialEq)]
pub struct AsrEvent {
    pub kind: AsrEventKind,
    pub text: String,
}

impl AsrEvent {
    #[must_use]
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: AsrEventKind::Partial,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            kind: AsrEventKind::Final,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.kind == AsrEventKind::Final
    }
}

/// Polymorphic transcription capability.
///
/// Implementations must be `Send + Sync` so the provider can be held behind
/// an `Arc` and called concurrently from the read loop and the relay task.
#[async_trait]
pub trait AsrProvider: Send + Sync {
    /// Accept a chunk of raw PCM16 LE audio. Returns `false` when the
    /// provider is applying backpressure (buffer full, channel full, or
    /// closed) — the caller (the Session) is responsible for the
    /// rate-limited client warning.
    async fn write_pcm(&self, bytes: &[u8]) -> bool;

    /// Pull the next available event, or `None` once the event stream is
    /// exhausted (provider closed and all in-flight work drained).
    async fn next_event(&self) -> Option<AsrEvent>;

    /// Total PCM chunks dropped since construction.
    fn dropped(&self) -> i64;

    /// Flush any buffered audio, scheduling a transcription if non-empty.
    async fn flush(&self);

    /// Idempotent teardown: flush, wait for in-flight transcription tasks,
    /// then close the event stream.
    async fn close(&self);
}

/// Construct the configured ASR provider, or `None` for `Disabled` — callers
/// skip audio handling entirely in that case. Construction failures log a
/// warning and fall back to `None` rather than failing session setup.
#[must_use]
pub fn build_asr_provider(config: &AppConfig, metrics: Arc<Metrics>) -> Option<Arc<dyn AsrProvider>> {
    match config.asr_provider {
        AsrProviderKind::Disabled => None,
        AsrProviderKind::Stub => Some(Arc::new(StubAsrProvider::new())),
        AsrProviderKind::Streaming => {
            match ReqwestAsrTransport::new(&config.asr_remote) {
                Ok(transport) => Some(Arc::new(StreamingAsrProvider::new(
                    Arc::new(transport),
                    config.asr_pcm_buffer,
                    metrics,
                ))),
                Err(err) => {
                    tracing::warn!(error = %err, "ASR provider construction failed, falling back to disabled");
                    None
                }
            }
        }
    }
}

pub(crate) fn construction_error(msg: impl Into<String>) -> CoreError {
    CoreError::AsrConstruction(msg.into())
}
