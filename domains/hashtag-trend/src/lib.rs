//! Trending-hashtag tracker: a thin façade over [`windowed_analytics::Analytics`].
//!
//! Grounded on the `hashtag_tracker.py` reference: a rolling Count-Min Sketch backs the
//! approximate, O(1) queries, while an exact per-hashtag timestamp list backs the authoritative
//! (but O(log n) per query, O(n) memory) queries. Both are kept in sync by `record_post`.
//!
//! Hashtags repeat heavily and the tag vocabulary is small relative to post volume, so every
//! `record_post` interns the tag through a shared [`windowed_analytics::Interner`] rather than
//! allocating a fresh `String` per event.

use std::collections::VecDeque;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;
use windowed_analytics::{AnalyticsConfig, Analytics, Interned, Interner};

/// Number of posts between opportunistic sweeps of expired timestamps and sketch buckets.
const CLEANUP_INTERVAL: u64 = 5000;

/// Tracks post frequency per hashtag and exposes exact and approximate trending queries.
pub struct TrendingTracker {
    analytics: Analytics<Interned>,
    interner: Interner,
    timestamps: Mutex<HashMap<Interned, VecDeque<i64>>>,
    window_seconds: i64,
    posts_since_cleanup: std::sync::atomic::AtomicU64,
}

impl TrendingTracker {
    /// Creates a tracker over the given window, at 10-second bucket granularity, tracking the
    /// top `top_k_capacity` hashtags.
    pub fn new(window_seconds: i64, top_k_capacity: usize) -> Self {
        let config = AnalyticsConfig::new()
            .with_window_seconds(window_seconds)
            .with_bucket_size(10)
            .with_top_k_capacity(top_k_capacity)
            .build()
            .expect("hashtag-trend default configuration is always valid");
        TrendingTracker {
            analytics: Analytics::new(config),
            interner: Interner::new(),
            timestamps: Mutex::new(HashMap::new()),
            window_seconds,
            posts_since_cleanup: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Records that a post with `hashtag` was created at `timestamp` (seconds since epoch).
    pub fn record_post(&self, hashtag: &str, timestamp: i64) {
        let tag = self.interner.intern(hashtag);
        self.analytics.record(&tag, timestamp, 1);

        let mut timestamps = self.timestamps.lock();
        let deque = timestamps.entry(tag).or_insert_with(VecDeque::new);
        let insert_at = deque.partition_point(|&ts| ts <= timestamp);
        deque.insert(insert_at, timestamp);
        drop(timestamps);

        let count = self.posts_since_cleanup.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
        if count >= CLEANUP_INTERVAL {
            self.cleanup();
        }
    }

    fn cleanup(&self) {
        self.analytics.evict_expired();
        let cutoff = self.analytics.observed_time() - self.window_seconds;
        let mut timestamps = self.timestamps.lock();
        let before = timestamps.len();
        timestamps.retain(|_, deque| {
            let drop_before = deque.partition_point(|&ts| ts <= cutoff);
            deque.drain(..drop_before);
            !deque.is_empty()
        });
        trace!(cutoff, dropped = before - timestamps.len(), "swept expired hashtag timestamps");
        self.posts_since_cleanup.store(0, std::sync::atomic::Ordering::Relaxed);
    }

    fn exact_count_since(&self, hashtag: &Interned, cutoff: i64) -> usize {
        let timestamps = self.timestamps.lock();
        match timestamps.get(hashtag) {
            Some(deque) => {
                let start = deque.partition_point(|&ts| ts < cutoff);
                deque.len() - start
            }
            None => 0,
        }
    }

    /// Returns the top `k` hashtags used in the last `t` seconds, ranked by exact frequency.
    pub fn get_top_k_trending(&self, k: usize, t: i64) -> Vec<(String, usize)> {
        let now = self.analytics.observed_time();
        let cutoff = now - t;
        let timestamps = self.timestamps.lock();
        let mut counts: Vec<(String, usize)> = timestamps
            .iter()
            .map(|(hashtag, deque)| {
                let start = deque.partition_point(|&ts| ts < cutoff);
                (hashtag.to_string(), deque.len() - start)
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        drop(timestamps);
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(k);
        counts
    }

    /// Same as [`Self::get_top_k_trending`] but answered from the rolling CMS: O(1) per
    /// candidate hashtag, with the Count-Min Sketch's usual over-count bias.
    pub fn get_top_k_trending_approximate(&self, k: usize, t: i64) -> Vec<(String, u64)> {
        let candidates: Vec<Interned> = self.timestamps.lock().keys().cloned().collect();
        let mut counts: Vec<(String, u64)> = candidates
            .into_iter()
            .map(|hashtag| {
                let count = self.analytics.count_window(&hashtag, t);
                (hashtag.to_string(), count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(k);
        counts
    }

    /// Reads the running, capacity-bounded top-K tracker directly: O(1), approximate-global
    /// (see [`windowed_analytics::BoundedTopK`]'s caveats).
    pub fn get_global_top_k_trending_fast(&self) -> Vec<(String, i64)> {
        self.analytics
            .top_k(self.analytics.config().top_k_capacity)
            .into_iter()
            .map(|(hashtag, score)| (hashtag.to_string(), score))
            .collect()
    }

    /// Posts-per-second rate for `hashtag` over the trailing `t` seconds, from the exact record.
    pub fn get_post_rate(&self, hashtag: &str, t: i64) -> f64 {
        let now = self.analytics.observed_time();
        let cutoff = now - t;
        let tag = self.interner.intern(hashtag);
        let posts = self.exact_count_since(&tag, cutoff) as f64;
        (posts / t as f64 * 1000.0).round() / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trending_hashtags_end_to_end() {
        let tracker = TrendingTracker::new(300, 1);
        tracker.record_post("#ai", 100);
        tracker.record_post("#ml", 110);
        tracker.record_post("#ai", 115);
        tracker.record_post("#go", 160);
        tracker.record_post("#ai", 400);

        // now=400, cutoff=100; the exact counter is boundary-inclusive (ts >= cutoff), so #ai's
        // post at ts=100 counts too: 3 posts, not 2.
        let exact = tracker.get_top_k_trending(2, 300);
        assert_eq!(exact[0], ("#ai".to_string(), 3));

        let approx = tracker.get_top_k_trending_approximate(2, 300);
        assert!(approx[0].1 >= 3);

        let fast = tracker.get_global_top_k_trending_fast();
        assert_eq!(fast[0].0, "#ai");
    }

    #[test]
    fn post_rate_matches_exact_window_count() {
        let tracker = TrendingTracker::new(300, 10);
        tracker.record_post("#ai", 100);
        tracker.record_post("#ai", 101);
        tracker.record_post("#ai", 103);
        let rate = tracker.get_post_rate("#ai", 4);
        assert_eq!(rate, 0.75);
    }

    #[test]
    fn unknown_hashtag_has_no_trend() {
        let tracker = TrendingTracker::new(300, 10);
        tracker.record_post("#ai", 100);
        assert_eq!(tracker.get_top_k_trending(5, 300).len(), 1);
    }

    #[test]
    fn repeated_hashtags_share_one_interned_allocation() {
        let tracker = TrendingTracker::new(300, 10);
        tracker.record_post("#ai", 100);
        tracker.record_post("#ai", 101);
        assert_eq!(tracker.interner.len(), 1);
    }
}
