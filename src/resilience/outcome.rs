//! Time-windowed success/failure counter.
//!
//! The window is a ring of fixed-width buckets. A bucket is stamped with the
//! slot (elapsed time / bucket width) it currently counts; a stale stamp means
//! the bucket is recycled on the next write and ignored on reads. The ring
//! holds one bucket more than the window so the partially filled current slot
//! never shortens it: a read at time `t` always covers `[t - window, t]`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::Outcome;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    slot: u64,
    successes: u64,
    failures: u64,
}

/// Failures and total within the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub failures: u64,
    pub total: u64,
}

impl OutcomeCounts {
    /// Failure ratio, 0 for an empty window.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures as f64 / self.total as f64
        }
    }
}

/// Concurrent rolling window of request outcomes.
#[derive(Debug)]
pub struct OutcomeTracker {
    origin: Instant,
    bucket: Duration,
    buckets: Mutex<Vec<Bucket>>,
}

impl OutcomeTracker {
    /// Create a tracker covering `window`, split into buckets of `bucket`.
    ///
    /// Zero widths are clamped to one millisecond.
    pub fn new(window: Duration, bucket: Duration) -> Self {
        let bucket = bucket.max(Duration::from_millis(1));
        let window = window.max(bucket);
        let len = window.as_nanos().div_ceil(bucket.as_nanos()).max(1) as usize + 1;

        Self {
            origin: Instant::now(),
            bucket,
            buckets: Mutex::new(vec![Bucket::default(); len]),
        }
    }

    /// Trailing window length.
    pub fn window(&self) -> Duration {
        self.bucket * (self.lock().len() - 1) as u32
    }

    pub fn record(&self, outcome: Outcome) {
        self.record_at(outcome, Instant::now());
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts_at(Instant::now())
    }

    /// failures / total within the trailing window, or 0 when empty.
    pub fn ratio(&self) -> f64 {
        self.counts().ratio()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        let mut buckets = self.lock();
        for bucket in buckets.iter_mut() {
            *bucket = Bucket::default();
        }
    }

    fn record_at(&self, outcome: Outcome, now: Instant) {
        let slot = self.slot(now);
        let mut buckets = self.lock();
        let len = buckets.len() as u64;
        let bucket = &mut buckets[(slot % len) as usize];
        if bucket.slot != slot {
            *bucket = Bucket {
                slot,
                ..Bucket::default()
            };
        }
        match outcome {
            Outcome::Success => bucket.successes += 1,
            Outcome::Failure => bucket.failures += 1,
        }
    }

    fn counts_at(&self, now: Instant) -> OutcomeCounts {
        let slot = self.slot(now);
        let buckets = self.lock();
        let window_slots = buckets.len() as u64 - 1;

        buckets
            .iter()
            .filter(|b| b.slot <= slot && slot - b.slot <= window_slots)
            .fold(OutcomeCounts::default(), |acc, b| OutcomeCounts {
                failures: acc.failures + b.failures,
                total: acc.total + b.failures + b.successes,
            })
    }

    fn slot(&self, now: Instant) -> u64 {
        (now.saturating_duration_since(self.origin).as_nanos() / self.bucket.as_nanos()) as u64
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
