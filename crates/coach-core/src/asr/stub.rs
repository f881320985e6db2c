//! Stub ASR provider — used for development and local testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{AsrEvent, AsrProvider};

/// Always rejects audio and never produces events. The event stream is
/// closed from construction.
#[derive(Debug, Default)]
pub struct StubAsrProvider {
    dropped: AtomicI64,
}

impl StubAsrProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsrProvider for StubAsrProvider {
    async fn write_pcm(&self, _bytes: &[u8]) -> bool {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        false
    }

    async fn next_event(&self) -> Option<AsrEvent> {
        None
    }

    fn dropped(&self) -> i64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn flush(&self) {}

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_rejects_and_counts_drops() {
        let stub = StubAsrProvider::new();
        assert!(!stub.write_pcm(&[0u8; 4]).await);
        assert!(!stub.write_pcm(&[0u8; 4]).await);
        assert_eq!(stub.dropped(), 2);
    }

    #[tokio::test]
    async fn event_stream_is_immediately_closed() {
        let stub = StubAsrProvider::new();
        assert_eq!(stub.next_event().await, None);
    }
}
