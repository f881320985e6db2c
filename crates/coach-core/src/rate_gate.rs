//! Minimum-interval admission gate.
//!
//! Admits at most one event per `every` window. Not a token bucket — a
//! single sliding slot. The first caller to acquire the mutex after the
//! window has elapsed wins; later callers in the same instant are rejected.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Thread-safe minimum-interval gate.
///
/// Deliberately not a token bucket: there is no capacity parameter and no
/// accrual. One admitted call consumes the slot until `every` elapses.
#[derive(Debug)]
pub struct RateGate {
    every: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl RateGate {
    /// Create a gate admitting at most one event per `every`.
    #[must_use]
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            last_admitted: Mutex::new(None),
        }
    }

    /// Returns true iff the wall-clock time since the last admitted call is
    /// at least `every`; on success, records `now` as the new baseline.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_admitted.lock().unwrap();
        let admit = match *last {
            None => true,
            Some(prev) => now.duration_since(prev) >= self.every,
        };
        if admit {
            *last = Some(now);
        }
        admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_admitted() {
        let gate = RateGate::new(Duration::from_millis(100));
        assert!(gate.allow());
    }

    #[test]
    fn rejects_within_window() {
        let gate = RateGate::new(Duration::from_millis(500));
        assert!(gate.allow());
        assert!(!gate.allow());
        assert!(!gate.allow());
    }

    #[tokio::test]
    async fn admits_again_after_window() {
        let gate = RateGate::new(Duration::from_millis(30));
        assert!(gate.allow());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(gate.allow());
    }

    #[test]
    fn bound_over_window_respects_ceiling() {
        // Over any wall-clock window W, admissions <= ceil(W / every).
        let every = Duration::from_millis(20);
        let gate = RateGate::new(every);
        let start = Instant::now();
        let mut admitted = 0u32;
        while start.elapsed() < Duration::from_millis(95) {
            if gate.allow() {
                admitted += 1;
            }
        }
        let ceiling = (95f64 / 20f64).ceil() as u32 + 1; // +1 slack for loop granularity
        assert!(admitted <= ceiling, "admitted {admitted} > ceiling {ceiling}");
    }
}
