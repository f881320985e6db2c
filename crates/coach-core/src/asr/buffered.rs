//! Buffered ASR provider: accumulates PCM until `flush`/`close`, then issues
//! one whole-utterance transcription request and emits a single `final`.
//!
//! Not reachable through `ASR_PROVIDER` today — no recognized value selects
//! it — but kept alongside `StreamingAsrProvider` as a second backend for
//! whole-utterance transcription.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex, Notify};

use super::streaming::AsrTransport;
use super::{AsrEvent, AsrProvider};
use crate::metrics::Metrics;

pub struct BufferedAsrProvider {
    transport: Arc<dyn AsrTransport>,
    buffer: Mutex<Vec<u8>>,
    event_rx: Mutex<mpsc::Receiver<AsrEvent>>,
    event_tx: mpsc::Sender<AsrEvent>,
    dropped: AtomicI64,
    in_flight: Arc<AtomicUsize>,
    inflight_notify: Arc<Notify>,
    closed: std::sync::atomic::AtomicBool,
    metrics: Arc<Metrics>,
}

impl BufferedAsrProvider {
    #[must_use]
    pub fn new(transport: Arc<dyn AsrTransport>, metrics: Arc<Metrics>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(4);
        Self {
            transport,
            buffer: Mutex::new(Vec::new()),
            event_rx: Mutex::new(event_rx),
            event_tx,
            dropped: AtomicI64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            inflight_notify: Arc::new(Notify::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
            metrics,
        }
    }

    async fn take_buffer(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock().await)
    }

    fn spawn_transcription(&self, batch: Vec<u8>) {
        if batch.is_empty() {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let tx = self.event_tx.clone();
        let notify = Arc::clone(&self.inflight_notify);
        let in_flight = Arc::clone(&self.in_flight);
        let metrics = Arc::clone(&self.metrics);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            match transport.transcribe_once(&batch).await {
                Ok(text) => {
                    let _ = tx.try_send(AsrEvent::final_(text));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "buffered ASR transcription failed");
                    metrics.asr_error();
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            notify.notify_waiters();
        });
    }
}

#[async_trait]
impl AsrProvider for BufferedAsrProvider {
    async fn write_pcm(&self, bytes: &[u8]) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.buffer.lock().await.extend_from_slice(bytes);
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
        self.spawn_transcription(batch);
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let batch = self.take_buffer().await;
        self.spawn_transcription(batch);
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

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::streaming::TransportError;

    struct FakeTransport;

    #[async_trait]
    impl AsrTransport for FakeTransport {
        async fn transcribe_once(&self, pcm: &[u8]) -> Result<String, TransportError> {
            Ok(format!("transcribed {} bytes", pcm.len()))
        }

        async fn open_stream(
            &self,
            _pcm: &[u8],
        ) -> Result<super::super::streaming::BoxByteStream, TransportError> {
            unreachable!("buffered provider never opens a stream")
        }
    }

    #[tokio::test]
    async fn flush_emits_single_final_for_whole_batch() {
        let provider = BufferedAsrProvider::new(Arc::new(FakeTransport), Metrics::new());
        provider.write_pcm(&[0u8; 4]).await;
        provider.write_pcm(&[0u8; 4]).await;
        provider.flush().await;

        let event = provider.next_event().await.unwrap();
        assert!(event.is_final());
        assert_eq!(event.text, "transcribed 8 bytes");
    }

    #[tokio::test]
    async fn empty_buffer_flush_emits_nothing() {
        let provider = BufferedAsrProvider::new(Arc::new(FakeTransport), Metrics::new());
        provider.flush().await;
        provider.close().await;
        assert_eq!(provider.next_event().await, None);
    }

    #[tokio::test]
    async fn close_awaits_in_flight_transcription_before_returning() {
        let provider = BufferedAsrProvider::new(Arc::new(FakeTransport), Metrics::new());
        provider.write_pcm(&[0u8; 16]).await;
        provider.close().await;
        assert!(!provider.write_pcm(&[0u8; 4]).await);
    }
}
