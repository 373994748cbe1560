//! The smallest cell of a [`crate::RingBuffer`]: a mutex-guarded `(era, value)` pair.

use parking_lot::Mutex;

/// Sentinel `start_time` meaning "never written". Era `0` is a legitimate bucket alignment, so
/// plain `0` cannot double as "empty".
const UNINITIALIZED: i64 = -1;

/// A single ring-buffer cell: a bucket-aligned timestamp (`start_time`/era) paired with an
/// accumulated `value`, guarded by one mutex.
///
/// Eras arrive out of order and are reused as the ring wraps, so every mutation compares the
/// incoming era against the era currently stored before deciding whether to accumulate or reset.
/// That comparison is what makes ring reuse safe without a separate sweep pass.
#[derive(Debug)]
pub struct AtomicBucket {
    inner: Mutex<BucketState>,
}

#[derive(Debug, Clone, Copy)]
struct BucketState {
    start_time: i64,
    value: u64,
}

impl Default for AtomicBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicBucket {
    /// Creates an empty bucket with the `UNINITIALIZED` sentinel era.
    pub fn new() -> Self {
        AtomicBucket {
            inner: Mutex::new(BucketState { start_time: UNINITIALIZED, value: 0 }),
        }
    }

    /// Adds `delta` to the bucket for the given `era`.
    ///
    /// - If `era` is older than the stored era, the write is stale and ignored.
    /// - If `era` is newer, the bucket rotates: it is reset to `(era, delta)`.
    /// - If `era` matches, `delta` accumulates onto the existing value.
    pub fn add(&self, era: i64, delta: u64) {
        let mut state = self.inner.lock();
        if era < state.start_time {
            return;
        }
        if era > state.start_time {
            state.start_time = era;
            state.value = delta;
        } else {
            state.value = state.value.saturating_add(delta);
        }
    }

    /// Subtracts `delta` from the bucket, saturating at zero, but only if `era` matches the
    /// bucket's current era exactly. A subtraction against a rotated-away era is a no-op: the
    /// contribution it would have undone is already gone.
    pub fn sub(&self, era: i64, delta: u64) {
        let mut state = self.inner.lock();
        if era == state.start_time {
            state.value = state.value.saturating_sub(delta);
        }
    }

    /// Atomically reads `(start_time, value)`.
    pub fn read(&self) -> (i64, u64) {
        let state = self.inner.lock();
        (state.start_time, state.value)
    }

    /// Returns `value` iff the bucket's era is at least `min_start`, else `0`.
    ///
    /// Used by window summation: a bucket whose era has rolled behind the query's cutoff no
    /// longer belongs to the window, even though its slot hasn't been physically reset yet.
    pub fn get_if_fresh(&self, min_start: i64) -> u64 {
        let state = self.inner.lock();
        if state.start_time >= min_start {
            state.value
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let bucket = AtomicBucket::new();
        assert_eq!(bucket.read(), (UNINITIALIZED, 0));
    }

    #[test]
    fn add_accumulates_within_same_era() {
        let bucket = AtomicBucket::new();
        bucket.add(100, 3);
        bucket.add(100, 4);
        assert_eq!(bucket.read(), (100, 7));
    }

    #[test]
    fn newer_era_rotates_the_bucket() {
        let bucket = AtomicBucket::new();
        bucket.add(100, 3);
        bucket.add(110, 5);
        assert_eq!(bucket.read(), (110, 5));
    }

    #[test]
    fn older_era_is_ignored() {
        let bucket = AtomicBucket::new();
        bucket.add(110, 5);
        bucket.add(100, 99);
        assert_eq!(bucket.read(), (110, 5));
    }

    #[test]
    fn sub_saturates_at_zero() {
        let bucket = AtomicBucket::new();
        bucket.add(100, 3);
        bucket.sub(100, 10);
        assert_eq!(bucket.read(), (100, 0));
    }

    #[test]
    fn sub_against_stale_era_is_noop() {
        let bucket = AtomicBucket::new();
        bucket.add(110, 5);
        bucket.sub(100, 5);
        assert_eq!(bucket.read(), (110, 5));
    }

    #[test]
    fn get_if_fresh_respects_cutoff() {
        let bucket = AtomicBucket::new();
        bucket.add(100, 7);
        assert_eq!(bucket.get_if_fresh(90), 7);
        assert_eq!(bucket.get_if_fresh(101), 0);
    }
}
