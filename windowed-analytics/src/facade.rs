//! The analytics façade: domain operations over a rolling CMS, rolling HLL, and bounded top-K.

use std::hash::Hash;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::config::AnalyticsConfig;
use crate::rolling_cms::RollingCMS;
use crate::rolling_hll::RollingHLL;
use crate::shard::ShardedLockMap;
use crate::topk::BoundedTopK;

/// Combines a [`RollingCMS`], a [`RollingHLL`], and a [`BoundedTopK`] behind the domain
/// operations every tracker in this workspace needs: record, retract, move, and the count/
/// unique/top-K queries. Mutations take the key's shard lock first, then any bucket locks inside
/// the sketches, then (briefly) the top-K lock -- a fixed ordering that rules out deadlock.
///
/// `K` is the opaque key type a domain façade records against: a hashtag, an ad ID, a user ID.
pub struct Analytics<K: Eq + Hash + Clone + Ord + Send + Sync + 'static> {
    config: AnalyticsConfig,
    shards: ShardedLockMap,
    rolling_cms: RollingCMS,
    rolling_hll: RollingHLL,
    top_k: RwLock<BoundedTopK<K>>,
    observed_time: AtomicI64,
    stale_event_count: AtomicU64,
}

impl<K: Eq + Hash + Clone + Ord + Send + Sync + 'static> Analytics<K> {
    /// Builds a façade from an already-validated config. Call `config.build()` first.
    pub fn new(config: AnalyticsConfig) -> Self {
        let rolling_cms =
            RollingCMS::new(config.window_seconds, config.bucket_size, config.cms_depth, config.cms_width);
        let rolling_hll = RollingHLL::new(config.window_seconds, config.bucket_size, config.hll_precision);
        let shards = ShardedLockMap::new(config.num_stripes);
        Analytics {
            config,
            shards,
            rolling_cms,
            rolling_hll,
            top_k: RwLock::new(BoundedTopK::new(config.top_k_capacity)),
            observed_time: AtomicI64::new(i64::MIN),
            stale_event_count: AtomicU64::new(0),
        }
    }

    /// The maximum timestamp ever ingested. `i64::MIN` before the first event.
    pub fn observed_time(&self) -> i64 {
        self.observed_time.load(Ordering::Acquire)
    }

    /// Number of events dropped so far for being older than `observed_time - max_lateness`.
    ///
    /// There is no separate metrics subsystem in this workspace, so the drop count is exposed
    /// directly here rather than emitted to an external counter.
    pub fn stale_event_count(&self) -> u64 {
        self.stale_event_count.load(Ordering::Relaxed)
    }

    fn advance_observed_time(&self, ts: i64) {
        self.observed_time.fetch_max(ts, Ordering::AcqRel);
    }

    fn is_stale(&self, ts: i64) -> bool {
        let now = self.observed_time();
        now != i64::MIN && ts < now - self.config.max_lateness_seconds
    }

    /// Records one occurrence of `key` at `ts` with weight `delta`, advancing `observed_time`
    /// and updating the rolling CMS, rolling HLL, and top-K tracker.
    ///
    /// Returns `false` (a silent drop, not an error) if `ts` is older than
    /// `observed_time - max_lateness_seconds`.
    pub fn record(&self, key: &K, ts: i64, delta: u64) -> bool {
        self.shards.with_lock(key, || {
            if self.is_stale(ts) {
                self.stale_event_count.fetch_add(1, Ordering::Relaxed);
                trace!(ts, "dropping stale event");
                return false;
            }
            self.advance_observed_time(ts);
            self.rolling_cms.add(key, ts, delta);
            self.rolling_hll.insert(key, ts);
            self.refresh_top_k(key);
            true
        })
    }

    /// Retracts a previously-recorded contribution at the same `(key, ts)`.
    ///
    /// A no-op (returns `false`) if `ts`'s era has already rolled out of the ring, or if `ts` is
    /// itself past the lateness horizon. Distinct counts are not retracted: a key that was later
    /// removed was still observed within the window, so the HLL is left untouched.
    pub fn retract(&self, key: &K, ts: i64, delta: u64) -> bool {
        self.shards.with_lock(key, || {
            if self.is_stale(ts) {
                return false;
            }
            let applied = self.rolling_cms.retract(key, ts, delta);
            if applied {
                self.refresh_top_k(key);
            }
            applied
        })
    }

    /// Relocates a prior contribution from `old_ts` to `new_ts`: `retract(old_ts)` followed by
    /// `record(new_ts)`. If the retraction at `old_ts` fails (stale or already rotated out), the
    /// whole operation is a no-op -- the `record` half never runs, so a move never manufactures
    /// a contribution out of thin air.
    pub fn move_contribution(&self, key: &K, old_ts: i64, new_ts: i64, delta: u64) -> bool {
        self.shards.with_lock(key, || {
            if self.is_stale(old_ts) {
                return false;
            }
            if !self.rolling_cms.retract(key, old_ts, delta) {
                return false;
            }
            if self.is_stale(new_ts) {
                self.stale_event_count.fetch_add(1, Ordering::Relaxed);
                self.refresh_top_k(key);
                return false;
            }
            self.advance_observed_time(new_ts);
            self.rolling_cms.add(key, new_ts, delta);
            self.rolling_hll.insert(key, new_ts);
            self.refresh_top_k(key);
            true
        })
    }

    fn refresh_top_k(&self, key: &K) {
        let score = self.rolling_cms.estimate_full_window(key) as i64;
        self.top_k.write().offer(key.clone(), score);
    }

    /// Approximate count of `key` over the trailing `min(t, window_seconds)` seconds, inclusive
    /// of the boundary (`ts == cutoff` counts).
    pub fn count_window(&self, key: &K, t: i64) -> u64 {
        let now = self.observed_time();
        if now == i64::MIN {
            return 0;
        }
        let effective = t.min(self.config.window_seconds);
        self.rolling_cms.estimate_since(key, now - effective, now)
    }

    /// Approximate count of `key` over the whole configured window.
    pub fn count_total(&self, key: &K) -> u64 {
        self.rolling_cms.estimate_full_window(key)
    }

    /// Approximate number of distinct keys observed in the trailing `min(t, window_seconds)`
    /// seconds.
    pub fn unique_window(&self, t: i64) -> f64 {
        let now = self.observed_time();
        if now == i64::MIN {
            return 0.0;
        }
        let effective = t.min(self.config.window_seconds);
        self.rolling_hll.unique_since(now - effective, now)
    }

    /// Up to `k` keys with the highest running score, descending.
    ///
    /// `BoundedTopK` tracks one running, capacity-bounded set of keys, not per-horizon history:
    /// a caller that needs an authoritative top-K for an arbitrary horizon `t` should fall back
    /// to a full recompute over the exact per-key counters it owns.
    pub fn top_k(&self, k: usize) -> Vec<(K, i64)> {
        let mut snapshot = self.top_k.write().snapshot();
        snapshot.truncate(k);
        snapshot
    }

    /// Scans every ring/sketch bucket and evicts eras that have fallen out of the window
    /// without a write since. Intended to be called periodically by a caller-owned background
    /// task; the core itself never spawns one.
    pub fn evict_expired(&self) {
        let now = self.observed_time();
        if now == i64::MIN {
            return;
        }
        let cutoff = now - self.config.window_seconds;
        self.rolling_cms.evict_expired(cutoff);
        self.rolling_hll.evict_expired(cutoff);
    }

    /// The configuration this façade was built from.
    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalyticsConfig {
        AnalyticsConfig::new().with_window_seconds(300).with_bucket_size(10).with_top_k_capacity(1).build().unwrap()
    }

    #[test]
    fn hashtag_trending_counts_and_ranks_by_frequency() {
        let analytics: Analytics<String> = Analytics::new(config());
        analytics.record(&"#ai".to_string(), 100, 1);
        analytics.record(&"#ml".to_string(), 110, 1);
        analytics.record(&"#ai".to_string(), 115, 1);
        analytics.record(&"#go".to_string(), 160, 1);
        analytics.record(&"#ai".to_string(), 400, 1);

        assert_eq!(analytics.observed_time(), 400);
        assert!(analytics.count_window(&"#ai".to_string(), 300) >= 2);
        assert!(analytics.count_window(&"#ml".to_string(), 300) >= 1);
        assert_eq!(analytics.top_k(1), vec![("#ai".to_string(), 3)]);
    }

    #[test]
    fn record_then_retract_is_idempotent_on_estimate() {
        let analytics: Analytics<String> = Analytics::new(config());
        let key = "k".to_string();
        analytics.record(&key, 100, 5);
        let before = analytics.count_total(&key);
        analytics.record(&key, 105, 3);
        analytics.retract(&key, 105, 3);
        assert_eq!(analytics.count_total(&key), before);
    }

    #[test]
    fn move_contribution_relocates_a_count() {
        let analytics: Analytics<String> = Analytics::new(config());
        let key = "o1".to_string();
        analytics.record(&key, 100, 10);
        assert!(analytics.move_contribution(&key, 100, 130, 10));
        assert_eq!(analytics.count_total(&key), 10);
    }

    #[test]
    fn stale_record_is_dropped_silently() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let cfg = AnalyticsConfig::new()
            .with_window_seconds(300)
            .with_bucket_size(10)
            .with_max_lateness_seconds(50)
            .build()
            .unwrap();
        let analytics: Analytics<String> = Analytics::new(cfg);
        analytics.record(&"k".to_string(), 1000, 1);
        // Accepted exactly at the lateness boundary.
        assert!(analytics.record(&"k".to_string(), 950, 1));
        // One second further back is dropped.
        assert!(!analytics.record(&"k".to_string(), 949, 1));
        assert_eq!(analytics.stale_event_count(), 1);
    }

    #[test]
    fn observed_time_is_max_of_ingested_timestamps() {
        let analytics: Analytics<String> = Analytics::new(config());
        analytics.record(&"a".to_string(), 50, 1);
        analytics.record(&"b".to_string(), 30, 1);
        analytics.record(&"c".to_string(), 70, 1);
        assert_eq!(analytics.observed_time(), 70);
    }

    #[test]
    fn queries_against_a_never_written_analytics_do_not_overflow() {
        let analytics: Analytics<String> = Analytics::new(config());
        assert_eq!(analytics.count_window(&"k".to_string(), 300), 0);
        assert_eq!(analytics.unique_window(300), 0.0);
    }
}
