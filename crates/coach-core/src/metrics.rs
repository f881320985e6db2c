//! Process-wide metrics sink.
//!
//! A set of atomic counters plus an active-session gauge, shared across every
//! session via `Arc<Metrics>`, dumped periodically by [`Metrics::spawn_logger`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// Process-wide monotonic counters and the active-session gauge.
#[derive(Debug, Default)]
pub struct Metrics {
    pub sessions_active: AtomicI64,
    pub sessions_total: AtomicU64,
    pub pcm_frames_received: AtomicU64,
    pub pcm_frames_dropped: AtomicU64,
    pub asr_partials: AtomicU64,
    pub asr_finals: AtomicU64,
    pub hints_emitted: AtomicU64,
    pub followups_emitted: AtomicU64,
    pub asr_errors: AtomicU64,
    pub hint_errors: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A session was accepted: increments both the gauge and the lifetime total.
    pub fn session_started(&self) {
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A session finished teardown: decrements the gauge only.
    pub fn session_ended(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn pcm_received(&self) {
        self.pcm_frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pcm_dropped(&self) {
        self.pcm_frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asr_partial(&self) {
        self.asr_partials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asr_final(&self) {
        self.asr_finals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hint_emitted(&self) {
        self.hints_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn followup_emitted(&self) {
        self.followups_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asr_error(&self) {
        self.asr_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hint_error(&self) {
        self.hint_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Log the current snapshot at `info` level as structured fields.
    fn log_snapshot(&self) {
        tracing::info!(
            target: "coach.metrics",
            sessions_active = self.sessions_active.load(Ordering::Relaxed),
            sessions_total = self.sessions_total.load(Ordering::Relaxed),
            pcm_frames_received = self.pcm_frames_received.load(Ordering::Relaxed),
            pcm_frames_dropped = self.pcm_frames_dropped.load(Ordering::Relaxed),
            asr_partials = self.asr_partials.load(Ordering::Relaxed),
            asr_finals = self.asr_finals.load(Ordering::Relaxed),
            hints_emitted = self.hints_emitted.load(Ordering::Relaxed),
            followups_emitted = self.followups_emitted.load(Ordering::Relaxed),
            asr_errors = self.asr_errors.load(Ordering::Relaxed),
            hint_errors = self.hint_errors.load(Ordering::Relaxed),
            "metrics snapshot"
        );
    }

    /// Spawn a background ticker that logs the snapshot every `interval`.
    ///
    /// Returns the task handle; dropping/aborting it stops the logger. There
    /// is no reset and no wrap-around handling — counters are expected to
    /// stay well within `u64` range for the lifetime of the process.
    pub fn spawn_logger(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                metrics.log_snapshot();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lifecycle_updates_gauge_and_total() {
        let metrics = Metrics::new();
        metrics.session_started();
        metrics.session_started();
        assert_eq!(metrics.sessions_active.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.sessions_total.load(Ordering::Relaxed), 2);

        metrics.session_ended();
        assert_eq!(metrics.sessions_active.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.sessions_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn logger_ticks_without_panicking() {
        let metrics = Metrics::new();
        let handle = metrics.spawn_logger(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.abort();
    }
}
