//! A ring of per-bucket [`CountMinSketch`]es plus a `merged` sketch summarising the whole window.

use std::hash::Hash;

use parking_lot::Mutex;

use crate::cms::CountMinSketch;

const UNINITIALIZED: i64 = -1;

struct Slot {
    era: i64,
    cms: CountMinSketch,
}

/// Rolling Count-Min Sketch over a sliding window.
///
/// Maintains one [`CountMinSketch`] per ring bucket plus a `merged` sketch that always equals
/// the cell-wise sum of the live buckets (outside of the brief window where a single bucket's
/// lock is held mid-rotation). The add protocol below is what preserves that invariant:
///
/// 1. Compute `era = era(ts)`, `idx = idx(ts)`.
/// 2. Lock bucket `idx`.
/// 3. If the bucket's era is older than `era`, subtract the bucket's sketch from `merged`, then
///    reset the bucket and stamp it with the new era.
/// 4. Add `delta` to both the bucket's sketch and `merged`.
///
/// Step 3's subtraction is always matched by an earlier step-4 addition for that same bucket
/// instance, so `merged` never drifts.
pub struct RollingCMS {
    bucket_size: i64,
    num_buckets: usize,
    depth: usize,
    width: usize,
    buckets: Vec<Mutex<Slot>>,
    merged: Mutex<CountMinSketch>,
}

impl RollingCMS {
    /// Creates a rolling sketch sized for `window_seconds` at `bucket_size` granularity, with
    /// per-bucket (and merged) shape `depth x width`.
    pub fn new(window_seconds: i64, bucket_size: i64, depth: usize, width: usize) -> Self {
        let num_buckets = ((window_seconds + bucket_size - 1) / bucket_size) as usize + 1;
        let buckets = (0..num_buckets)
            .map(|_| Mutex::new(Slot { era: UNINITIALIZED, cms: CountMinSketch::new(depth, width) }))
            .collect();
        RollingCMS {
            bucket_size,
            num_buckets,
            depth,
            width,
            buckets,
            merged: Mutex::new(CountMinSketch::new(depth, width)),
        }
    }

    #[inline]
    fn era(&self, ts: i64) -> i64 {
        ts.div_euclid(self.bucket_size) * self.bucket_size
    }

    #[inline]
    fn idx(&self, ts: i64) -> usize {
        ts.div_euclid(self.bucket_size).rem_euclid(self.num_buckets as i64) as usize
    }

    /// Adds `delta` for `key` at `ts`, rotating the target bucket first if its era is stale.
    pub fn add<K: Hash + ?Sized>(&self, key: &K, ts: i64, delta: u64) {
        let era = self.era(ts);
        let idx = self.idx(ts);
        let mut slot = self.buckets[idx].lock();
        if slot.era < era {
            let mut merged = self.merged.lock();
            merged.subtract(&slot.cms);
            slot.cms.reset();
            slot.era = era;
            drop(merged);
        }
        slot.cms.add(key, delta);
        drop(slot);
        self.merged.lock().add(key, delta);
    }

    /// Retracts a previously-added contribution at `ts`, returning `true` if it was applied.
    ///
    /// Only succeeds if the target bucket's era still matches `era(ts)` -- i.e. the bucket has
    /// not rotated since the original add. A retraction against a since-rotated bucket is a
    /// no-op and returns `false`: the contribution it would have undone is already gone from
    /// both the bucket and `merged`.
    pub fn retract<K: Hash + ?Sized>(&self, key: &K, ts: i64, delta: u64) -> bool {
        let era = self.era(ts);
        let idx = self.idx(ts);
        let mut slot = self.buckets[idx].lock();
        if slot.era != era {
            return false;
        }
        slot.cms.retract(key, delta);
        drop(slot);
        self.merged.lock().retract(key, delta);
        true
    }

    /// Full-window estimate: reads `merged` directly, an O(1) snapshot consistent with every
    /// completed write.
    pub fn estimate_full_window<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        self.merged.lock().estimate(key)
    }

    /// Estimate over `[cutoff, now]`. Delegates to `merged` when the requested span covers (or
    /// exceeds) the whole window; otherwise sums the per-bucket estimates for buckets whose era
    /// falls in range, which is a valid upper bound but not exact (a key can appear in a bucket
    /// more than once across the summed rows due to hash collisions across buckets).
    pub fn estimate_since<K: Hash + ?Sized>(&self, key: &K, cutoff: i64, now: i64) -> u64 {
        let window = self.bucket_size * self.num_buckets as i64;
        if now.saturating_sub(cutoff) >= window {
            return self.estimate_full_window(key);
        }
        let cutoff_era = self.era(cutoff);
        let now_era = self.era(now);
        self.buckets
            .iter()
            .map(|b| {
                let slot = b.lock();
                if slot.era >= cutoff_era && slot.era <= now_era {
                    slot.cms.estimate(key)
                } else {
                    0
                }
            })
            .sum()
    }

    /// Scans every bucket and subtracts from `merged` any whose era has fallen behind `cutoff`
    /// without having been touched by a write since. Mirrors exactly what the `add` rotation
    /// step would do, so it is safe to call concurrently with writers.
    pub fn evict_expired(&self, cutoff: i64) {
        let cutoff_era = self.era(cutoff);
        for bucket in &self.buckets {
            let mut slot = bucket.lock();
            if slot.era != UNINITIALIZED && slot.era < cutoff_era {
                let mut merged = self.merged.lock();
                merged.subtract(&slot.cms);
                drop(merged);
                slot.cms.reset();
                slot.era = UNINITIALIZED;
            }
        }
    }

    /// Depth of the sketch shape.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Width of the sketch shape.
    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_equals_sum_of_buckets() {
        let rolling = RollingCMS::new(300, 10, 4, 64);
        rolling.add("#ai", 100, 1);
        rolling.add("#ml", 110, 1);
        rolling.add("#ai", 115, 1);
        rolling.add("#go", 160, 1);
        rolling.add("#ai", 400, 1);
        assert!(rolling.estimate_full_window("#ai") >= 2);
        assert!(rolling.estimate_full_window("#ml") >= 1);
    }

    #[test]
    fn wrap_subtracts_old_bucket_before_reset() {
        let rolling = RollingCMS::new(50, 10, 2, 16); // num_buckets = 6
        rolling.add("k", 0, 5);
        let wrap_ts = rolling.num_buckets as i64 * 10;
        rolling.add("k", wrap_ts, 3);
        assert_eq!(rolling.estimate_full_window("k"), 3);
    }

    #[test]
    fn retract_undoes_a_same_era_add() {
        let rolling = RollingCMS::new(300, 10, 4, 64);
        rolling.add("k", 100, 5);
        assert!(rolling.retract("k", 100, 5));
        assert_eq!(rolling.estimate_full_window("k"), 0);
    }

    #[test]
    fn retract_against_rotated_bucket_is_noop() {
        let rolling = RollingCMS::new(50, 10, 2, 16); // num_buckets = 6
        rolling.add("k", 0, 5);
        let wrap_ts = rolling.num_buckets as i64 * 10;
        rolling.add("k", wrap_ts, 1); // rotates the bucket holding era 0
        assert!(!rolling.retract("k", 0, 5));
    }

    #[test]
    fn estimate_since_upper_bounds_full_window_for_recent_span() {
        let rolling = RollingCMS::new(300, 10, 4, 64);
        rolling.add("#ai", 100, 1);
        rolling.add("#ai", 115, 1);
        rolling.add("#ai", 400, 1);
        let since = rolling.estimate_since("#ai", 100, 400);
        assert!(since >= 2);
    }

    #[test]
    fn evict_expired_subtracts_from_merged() {
        let rolling = RollingCMS::new(50, 10, 2, 16);
        rolling.add("k", 0, 5);
        rolling.evict_expired(1000);
        assert_eq!(rolling.estimate_full_window("k"), 0);
    }
}
