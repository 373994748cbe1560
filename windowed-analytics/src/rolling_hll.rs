//! A ring of per-bucket [`HyperLogLog`] sketches for windowed approximate distinct-count.

use std::hash::Hash;

use parking_lot::Mutex;

use crate::hll::HyperLogLog;

const UNINITIALIZED: i64 = -1;

struct Slot {
    era: i64,
    hll: HyperLogLog,
}

/// Rolling HyperLogLog over a sliding window.
///
/// Unlike [`crate::RollingCMS`] there is no maintained `merged` summary: HLL merge is cheap
/// enough (`O(num_registers)`) to perform on demand at query time, so `unique_since` simply
/// merges the per-bucket sketches covering the requested suffix of the window into a scratch
/// sketch and estimates from that.
pub struct RollingHLL {
    bucket_size: i64,
    num_buckets: usize,
    precision: u8,
    buckets: Vec<Mutex<Slot>>,
}

impl RollingHLL {
    /// Creates a rolling sketch sized for `window_seconds` at `bucket_size` granularity, with
    /// per-bucket precision `precision`.
    pub fn new(window_seconds: i64, bucket_size: i64, precision: u8) -> Self {
        let num_buckets = ((window_seconds + bucket_size - 1) / bucket_size) as usize + 1;
        let buckets = (0..num_buckets)
            .map(|_| Mutex::new(Slot { era: UNINITIALIZED, hll: HyperLogLog::new(precision) }))
            .collect();
        RollingHLL { bucket_size, num_buckets, precision, buckets }
    }

    #[inline]
    fn era(&self, ts: i64) -> i64 {
        ts.div_euclid(self.bucket_size) * self.bucket_size
    }

    #[inline]
    fn idx(&self, ts: i64) -> usize {
        ts.div_euclid(self.bucket_size).rem_euclid(self.num_buckets as i64) as usize
    }

    /// Inserts `key` at `ts`, rotating (resetting) the target bucket first if its era is stale.
    pub fn insert<K: Hash + ?Sized>(&self, key: &K, ts: i64) {
        let era = self.era(ts);
        let idx = self.idx(ts);
        let mut slot = self.buckets[idx].lock();
        if slot.era < era {
            slot.hll.reset();
            slot.era = era;
        }
        slot.hll.insert(key);
    }

    /// Estimated distinct count over `[cutoff, now]`: merges every bucket whose era falls in
    /// that range into a fresh sketch and returns its cardinality estimate.
    pub fn unique_since(&self, cutoff: i64, now: i64) -> f64 {
        let cutoff_era = self.era(cutoff);
        let now_era = self.era(now);
        let mut merged = HyperLogLog::new(self.precision);
        for bucket in &self.buckets {
            let slot = bucket.lock();
            if slot.era >= cutoff_era && slot.era <= now_era {
                merged.merge(&slot.hll);
            }
        }
        merged.estimate()
    }

    /// Scans every bucket and resets any whose era has fallen behind `cutoff`.
    pub fn evict_expired(&self, cutoff: i64) {
        let cutoff_era = self.era(cutoff);
        for bucket in &self.buckets {
            let mut slot = bucket.lock();
            if slot.era != UNINITIALIZED && slot.era < cutoff_era {
                slot.hll.reset();
                slot.era = UNINITIALIZED;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_since_merges_covered_buckets() {
        // A week-long window at hourly granularity, as a distinct-visitor tracker would use.
        let rolling = RollingHLL::new(7 * 86_400, 3_600, 12);
        rolling.insert(&"user1", 1);
        rolling.insert(&"user2", 2);
        rolling.insert(&"user3", 3);
        rolling.insert(&"user4", 8 * 86_400);
        rolling.insert(&"user5", 8 * 86_400 + 1);

        let now = 8 * 86_400 + 1;
        let estimate = rolling.unique_since(now - 1000, now);
        let error = (estimate - 2.0).abs();
        assert!(error <= 2.0 * 2.0, "estimate {estimate} too far from 2");
    }

    #[test]
    fn evict_expired_resets_stale_buckets() {
        let rolling = RollingHLL::new(50, 10, 8);
        rolling.insert(&"k", 0);
        rolling.evict_expired(1000);
        assert_eq!(rolling.unique_since(0, 1000), 0.0);
    }
}
