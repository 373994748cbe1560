//! A fixed-size circular array of [`AtomicBucket`]s providing windowed increment/decrement and
//! windowed summation.

use crate::atomic_bucket::AtomicBucket;

/// A ring of `num_buckets` [`AtomicBucket`]s addressed by bucket-aligned timestamp.
///
/// `num_buckets = ceil(window_seconds / bucket_size) + 1`: the extra slot guarantees a query
/// landing exactly on the right edge of the window still observes a full window.
#[derive(Debug)]
pub struct RingBuffer {
    bucket_size: i64,
    num_buckets: usize,
    buckets: Vec<AtomicBucket>,
}

impl RingBuffer {
    /// Creates a ring sized for `window_seconds` at `bucket_size` granularity.
    pub fn new(window_seconds: i64, bucket_size: i64) -> Self {
        let num_buckets = ((window_seconds + bucket_size - 1) / bucket_size) as usize + 1;
        let buckets = (0..num_buckets).map(|_| AtomicBucket::new()).collect();
        RingBuffer { bucket_size, num_buckets, buckets }
    }

    /// The bucket-aligned era for `ts`.
    #[inline]
    pub fn era(&self, ts: i64) -> i64 {
        ts.div_euclid(self.bucket_size) * self.bucket_size
    }

    /// The ring slot index for `ts`.
    #[inline]
    pub fn idx(&self, ts: i64) -> usize {
        let slot = ts.div_euclid(self.bucket_size);
        slot.rem_euclid(self.num_buckets as i64) as usize
    }

    /// Adds `delta` at `ts` (default delta of `1` is the caller's choice, not enforced here).
    pub fn add(&self, ts: i64, delta: u64) {
        let idx = self.idx(ts);
        self.buckets[idx].add(self.era(ts), delta);
    }

    /// Subtracts `delta` at `ts`; a no-op if the bucket has since rotated past `ts`'s era.
    pub fn sub(&self, ts: i64, delta: u64) {
        let idx = self.idx(ts);
        self.buckets[idx].sub(self.era(ts), delta);
    }

    /// Sums every bucket whose era is at least `cutoff`'s era.
    pub fn sum_since(&self, cutoff: i64) -> u64 {
        let min_start = self.era(cutoff);
        self.buckets.iter().map(|b| b.get_if_fresh(min_start)).sum()
    }

    /// Sums every currently-live bucket value, regardless of era. Fast, windowless.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|b| b.read().1).sum()
    }

    /// Number of buckets in the ring.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_since_includes_boundary() {
        let ring = RingBuffer::new(300, 10);
        ring.add(100, 1);
        ring.add(115, 1);
        ring.add(400, 1);
        // observed_time = 400, cutoff = 100: ts == cutoff is included.
        assert_eq!(ring.sum_since(100), 2);
    }

    #[test]
    fn wrap_around_subtracts_old_era_first() {
        let ring = RingBuffer::new(50, 10); // num_buckets = 6
        ring.add(0, 5);
        // Exactly at wrap: bucket previously holding era 0 is overwritten.
        let wrap_ts = ring.buckets.len() as i64 * 10;
        ring.add(wrap_ts, 3);
        assert_eq!(ring.total(), 3);
    }

    #[test]
    fn total_ignores_cutoff() {
        let ring = RingBuffer::new(60, 10);
        ring.add(5, 2);
        ring.add(15, 3);
        assert_eq!(ring.total(), 5);
    }

    #[test]
    fn negative_timestamps_index_safely() {
        let ring = RingBuffer::new(60, 10);
        ring.add(-15, 1);
        assert_eq!(ring.total(), 1);
    }

    #[quickcheck_macros::quickcheck]
    fn total_matches_sum_of_adds_within_one_window(deltas: Vec<u8>) -> bool {
        let ring = RingBuffer::new(300, 10);
        let mut expected = 0u64;
        for (i, &d) in deltas.iter().enumerate() {
            let ts = (i as i64 % 30) * 10;
            ring.add(ts, d as u64);
            expected += d as u64;
        }
        ring.total() == expected
    }
}
