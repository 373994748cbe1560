//! Approximate unique-visitor counting over a rolling window.
//!
//! Grounded on the `visit_tracker.py` reference: visits are hashed into a
//! [`windowed_analytics::RollingHLL`] keyed by bucket, and a query merges the buckets covering the
//! requested suffix of the window into a scratch sketch before estimating cardinality.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use windowed_analytics::RollingHLL;

/// Number of visits between opportunistic sweeps of expired HLL buckets.
const DEFAULT_CLEANUP_THRESHOLD: u64 = 5000;

/// Tracks approximate distinct visitors over a trailing window.
pub struct VisitTracker {
    rolling_hll: RollingHLL,
    window_seconds: i64,
    current_time: AtomicI64,
    events_since_cleanup: AtomicU64,
    cleanup_threshold: u64,
}

impl VisitTracker {
    /// Creates a tracker over a 7-day window at 1-hour bucket granularity, the reference system's
    /// defaults.
    pub fn new() -> Self {
        Self::with_config(7 * 86_400, 3_600, 14, DEFAULT_CLEANUP_THRESHOLD)
    }

    /// Creates a tracker with explicit window, bucket size, HLL precision, and cleanup cadence.
    pub fn with_config(window_seconds: i64, bucket_size: i64, hll_precision: u8, cleanup_threshold: u64) -> Self {
        VisitTracker {
            rolling_hll: RollingHLL::new(window_seconds, bucket_size, hll_precision),
            window_seconds,
            current_time: AtomicI64::new(0),
            events_since_cleanup: AtomicU64::new(0),
            cleanup_threshold,
        }
    }

    /// Records that `user_id` visited at `timestamp`.
    pub fn record_visit(&self, user_id: &str, timestamp: i64) {
        self.current_time.fetch_max(timestamp, Ordering::AcqRel);
        self.rolling_hll.insert(&user_id, timestamp);

        let count = self.events_since_cleanup.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.cleanup_threshold {
            self.rolling_hll.evict_expired(self.current_time.load(Ordering::Acquire) - self.window_seconds);
            self.events_since_cleanup.store(0, Ordering::Relaxed);
        }
    }

    /// Approximate number of distinct visitors in the trailing `t` seconds.
    pub fn get_unique_visitors_last_t_seconds(&self, t: i64) -> u64 {
        let now = self.current_time.load(Ordering::Acquire);
        let cutoff = (now - t).max(0);
        self.rolling_hll.unique_since(cutoff, now).round() as u64
    }
}

impl Default for VisitTracker {
    fn default() -> Self {
        Self::new()
    }
}
