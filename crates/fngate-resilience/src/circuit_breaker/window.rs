//! Bucketed rolling window of call outcomes.
//!
//! The window is split into fixed-length buckets; buckets that fall entirely
//! outside the window are discarded on every access, so the counts always
//! describe roughly the last `window` of wall-clock time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    started: Instant,
    successes: u64,
    failures: u64,
}

/// Aggregated counts over the live part of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub total: u64,
    pub failures: u64,
}

impl WindowCounts {
    /// Failure percentage (0-100); zero when the window is empty.
    pub fn error_percentage(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.failures * 100 / self.total
        }
    }
}

#[derive(Debug)]
pub(crate) struct RollingWindow {
    window: Duration,
    bucket_len: Duration,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    pub(crate) fn new(window: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        let bucket_len = (window / buckets).max(Duration::from_millis(1));
        Self {
            window,
            bucket_len,
            buckets: VecDeque::with_capacity(buckets as usize),
        }
    }

    pub(crate) fn record(&mut self, now: Instant, success: bool) {
        self.prune(now);
        let needs_bucket = self
            .buckets
            .back()
            .is_none_or(|b| now.duration_since(b.started) >= self.bucket_len);
        if needs_bucket {
            self.buckets.push_back(Bucket {
                started: now,
                successes: 0,
                failures: 0,
            });
        }
        if let Some(bucket) = self.buckets.back_mut() {
            if success {
                bucket.successes += 1;
            } else {
                bucket.failures += 1;
            }
        }
    }

    pub(crate) fn counts(&mut self, now: Instant) -> WindowCounts {
        self.prune(now);
        self.buckets
            .iter()
            .fold(WindowCounts::default(), |acc, b| WindowCounts {
                total: acc.total + b.successes + b.failures,
                failures: acc.failures + b.failures,
            })
    }

    pub(crate) fn reset(&mut self) {
        self.buckets.clear();
    }

    fn prune(&mut self, now: Instant) {
        while self
            .buckets
            .front()
            .is_some_and(|b| now.duration_since(b.started) >= self.window)
        {
            self.buckets.pop_front();
        }
    }
}
