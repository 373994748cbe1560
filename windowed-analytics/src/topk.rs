//! A keyed, bounded top-K tracker.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::hash::Hash;

use hashbrown::HashMap;

/// A priority structure of capacity `K` mapping key -> score.
///
/// Backed by a `HashMap<K, i64>` holding the authoritative score per key, plus a min-heap used
/// to find the current minimum in amortized `O(log K)`. The heap may carry stale entries (a
/// key's score changed, or the key was evicted) -- those are discarded lazily the next time they
/// surface at the top, rather than eagerly repaired on every update. This trades true
/// decrease-key support for a much simpler implementation.
///
/// `BoundedTopK` is only approximate-global: a key that never qualifies for the top K is
/// forgotten even if later activity would have qualified it. It is meant for a *running*
/// top-K, with callers falling back to a full recompute path when an authoritative answer is
/// required.
pub struct BoundedTopK<K: Eq + Hash + Clone + Ord> {
    capacity: usize,
    scores: HashMap<K, i64>,
    heap: BinaryHeap<Reverse<(i64, K)>>,
}

impl<K: Eq + Hash + Clone + Ord> BoundedTopK<K> {
    /// Creates a tracker with the given capacity. Capacity must be positive; validated upstream
    /// by `AnalyticsConfig::build`.
    pub fn new(capacity: usize) -> Self {
        BoundedTopK { capacity, scores: HashMap::new(), heap: BinaryHeap::new() }
    }

    fn clean_top(&mut self) {
        while let Some(Reverse((score, key))) = self.heap.peek() {
            match self.scores.get(key) {
                Some(&current) if current == *score => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }

    /// Current minimum score among tracked keys, or `None` if empty.
    pub fn peek_min(&mut self) -> Option<(K, i64)> {
        self.clean_top();
        self.heap.peek().map(|Reverse((score, key))| (key.clone(), *score))
    }

    /// Offers `(key, score)`:
    /// - if `key` is already tracked, its score is updated in place;
    /// - else if there is spare capacity, `key` is inserted;
    /// - else if `score` beats the current minimum, the minimum is evicted and `key` inserted;
    /// - else the offer is ignored.
    ///
    /// A score of `<= 0` always evicts the key, per the bounded-top-K invariant.
    pub fn offer(&mut self, key: K, score: i64) {
        if score <= 0 {
            self.scores.remove(&key);
            return;
        }

        if self.scores.contains_key(&key) {
            self.scores.insert(key.clone(), score);
            self.heap.push(Reverse((score, key)));
            return;
        }

        if self.scores.len() < self.capacity {
            self.scores.insert(key.clone(), score);
            self.heap.push(Reverse((score, key)));
            return;
        }

        if let Some((min_key, min_score)) = self.peek_min() {
            if score > min_score {
                self.scores.remove(&min_key);
                self.scores.insert(key.clone(), score);
                self.heap.push(Reverse((score, key)));
            }
        }
    }

    /// Same as [`Self::offer`] but named to make the "score 0 removes" semantics explicit at
    /// call sites that are specifically doing a removal (e.g. a key going idle).
    pub fn set(&mut self, key: K, score: i64) {
        self.offer(key, score);
    }

    /// Removes `key` outright, regardless of score.
    pub fn remove(&mut self, key: &K) {
        self.scores.remove(key);
    }

    /// All tracked `(key, score)` pairs, sorted descending by score.
    pub fn snapshot(&self) -> Vec<(K, i64)> {
        let mut items: Vec<(K, i64)> = self.scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether no keys are currently tracked.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_capacity() {
        let mut topk: BoundedTopK<&str> = BoundedTopK::new(2);
        topk.offer("a", 1);
        topk.offer("b", 2);
        topk.offer("c", 3);
        assert_eq!(topk.len(), 2);
        let snap = topk.snapshot();
        assert_eq!(snap, vec![("c", 3), ("b", 2)]);
    }

    #[test]
    fn lower_score_does_not_displace_when_full() {
        let mut topk: BoundedTopK<&str> = BoundedTopK::new(1);
        topk.offer("a", 10);
        topk.offer("b", 1);
        assert_eq!(topk.snapshot(), vec![("a", 10)]);
    }

    #[test]
    fn update_in_place_changes_score() {
        let mut topk: BoundedTopK<&str> = BoundedTopK::new(3);
        topk.offer("a", 1);
        topk.offer("a", 50);
        assert_eq!(topk.snapshot(), vec![("a", 50)]);
    }

    #[test]
    fn non_positive_score_evicts() {
        let mut topk: BoundedTopK<&str> = BoundedTopK::new(3);
        topk.offer("a", 5);
        topk.offer("a", 0);
        assert!(topk.is_empty());
    }

    #[test]
    fn snapshot_is_non_increasing() {
        let mut topk: BoundedTopK<i32> = BoundedTopK::new(5);
        for (k, s) in [(1, 3), (2, 9), (3, 1), (4, 7)] {
            topk.offer(k, s);
        }
        let snap = topk.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn hashtag_trending_example_top1() {
        // Capacity-1 top-K over the same stream as the hashtag trending walkthrough.
        let mut topk: BoundedTopK<&str> = BoundedTopK::new(1);
        topk.offer("#ai", 1);
        topk.offer("#ml", 1);
        topk.offer("#ai", 2);
        topk.offer("#go", 1);
        topk.offer("#ai", 3);
        assert_eq!(topk.snapshot(), vec![("#ai", 3)]);
    }
}
