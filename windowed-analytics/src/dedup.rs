//! Bounded per-op idempotency cache.
//!
//! Domain wrappers that accept a caller-supplied idempotency token (an `(op, key, ts, ...)`
//! tuple) use this to make re-applying the same operation a no-op rather than double-counting
//! it. Capacity-bounded: the cache is a FIFO ring, not an unbounded set, so memory stays flat
//! regardless of how many distinct tokens are ever seen.

use std::hash::Hash;
use std::collections::VecDeque;

use hashbrown::HashSet;
use parking_lot::Mutex;

struct State<T> {
    seen: HashSet<T>,
    order: VecDeque<T>,
    capacity: usize,
}

/// A thread-safe, capacity-bounded idempotency cache.
pub struct DedupCache<T: Eq + Hash + Clone> {
    inner: Mutex<State<T>>,
}

impl<T: Eq + Hash + Clone> DedupCache<T> {
    /// Creates a cache holding at most `capacity` tokens.
    pub fn new(capacity: usize) -> Self {
        DedupCache {
            inner: Mutex::new(State {
                seen: HashSet::with_capacity(capacity.min(1024)),
                order: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            }),
        }
    }

    /// Records `token`, returning `true` if it was newly seen (the caller should apply the
    /// operation) or `false` if it was already present (the caller should treat this as a no-op
    /// repeat of a prior call).
    pub fn check_and_insert(&self, token: T) -> bool {
        let mut state = self.inner.lock();
        if state.seen.contains(&token) {
            return false;
        }
        if state.order.len() >= state.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.seen.remove(&oldest);
            }
        }
        state.seen.insert(token.clone());
        state.order.push_back(token);
        true
    }

    /// Number of tokens currently retained.
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    /// Whether the cache currently holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_is_fresh_second_is_duplicate() {
        let cache: DedupCache<(u32, i64)> = DedupCache::new(8);
        assert!(cache.check_and_insert((1, 100)));
        assert!(!cache.check_and_insert((1, 100)));
    }

    #[test]
    fn evicts_oldest_once_over_capacity() {
        let cache: DedupCache<u32> = DedupCache::new(2);
        assert!(cache.check_and_insert(1));
        assert!(cache.check_and_insert(2));
        assert!(cache.check_and_insert(3)); // evicts 1
        assert!(cache.check_and_insert(1)); // 1 was evicted, so this is "fresh" again
    }
}
