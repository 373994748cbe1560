//! A `depth x width` Count-Min Sketch for approximate per-key frequency.

use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Per-row seeds are plain multiples of a prime, matching the corpus's `mmh3.hash(item, seed)`
/// discipline (see `system_algo/hashtag_tracker.py`), folded here through `XxHash64::with_seed`
/// so each row is an independently-seeded 64-bit hash rather than requiring an FFI MurmurHash.
fn row_seed(row: usize) -> u64 {
    (row as u64) * 31 + 1
}

fn hash_with_seed<K: Hash + ?Sized>(key: &K, seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    key.hash(&mut hasher);
    hasher.finish()
}

/// A `depth x width` table of unsigned 64-bit counters with `depth` independent hash seeds.
///
/// `estimate(key)` is always `>= true_count(key)`: the sketch never under-counts, only
/// over-counts via hash collisions.
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    depth: usize,
    width: usize,
    table: Vec<u64>,
}

impl CountMinSketch {
    /// Creates a zeroed sketch of the given shape.
    pub fn new(depth: usize, width: usize) -> Self {
        assert!(depth > 0 && width > 0, "CMS depth and width must be positive");
        CountMinSketch { depth, width, table: vec![0u64; depth * width] }
    }

    #[inline]
    fn cell(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    fn col_for<K: Hash + ?Sized>(&self, key: &K, row: usize) -> usize {
        (hash_with_seed(key, row_seed(row)) % self.width as u64) as usize
    }

    /// Adds `delta` to `key`'s count in every row.
    pub fn add<K: Hash + ?Sized>(&mut self, key: &K, delta: u64) {
        for row in 0..self.depth {
            let col = self.col_for(key, row);
            let cell = self.cell(row, col);
            self.table[cell] = self.table[cell].saturating_add(delta);
        }
    }

    /// Returns the minimum counter across all rows for `key`: the Count-Min estimate.
    pub fn estimate<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        (0..self.depth)
            .map(|row| {
                let col = self.col_for(key, row);
                self.table[self.cell(row, col)]
            })
            .min()
            .unwrap_or(0)
    }

    /// Subtracts `delta` from `key`'s counter in every row, saturating at zero.
    ///
    /// Used to undo a previous `add` for the same key (a retraction), as distinct from
    /// [`Self::subtract`], which subtracts an entire other sketch cell-wise.
    pub fn retract<K: Hash + ?Sized>(&mut self, key: &K, delta: u64) {
        for row in 0..self.depth {
            let col = self.col_for(key, row);
            let cell = self.cell(row, col);
            self.table[cell] = self.table[cell].saturating_sub(delta);
        }
    }

    /// Cell-wise saturating subtraction of `other` from `self`.
    ///
    /// Panics if the shapes differ -- callers always pair sketches of identical shape drawn
    /// from the same `RollingCMS`.
    pub fn subtract(&mut self, other: &CountMinSketch) {
        assert_eq!(self.depth, other.depth, "CMS depth mismatch");
        assert_eq!(self.width, other.width, "CMS width mismatch");
        for (cell, other_cell) in self.table.iter_mut().zip(other.table.iter()) {
            *cell = cell.saturating_sub(*other_cell);
        }
    }

    /// Cell-wise addition of `other` into `self`. Used when folding a bucket's sketch into the
    /// rolling window's merged summary.
    pub fn add_sketch(&mut self, other: &CountMinSketch) {
        assert_eq!(self.depth, other.depth, "CMS depth mismatch");
        assert_eq!(self.width, other.width, "CMS width mismatch");
        for (cell, other_cell) in self.table.iter_mut().zip(other.table.iter()) {
            *cell = cell.saturating_add(*other_cell);
        }
    }

    /// Zeroes every cell.
    pub fn reset(&mut self) {
        self.table.iter_mut().for_each(|c| *c = 0);
    }

    /// Depth (number of hash rows).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Width (number of columns per row).
    pub fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn estimate_never_undercounts() {
        let mut cms = CountMinSketch::new(4, 16);
        cms.add("a", 3);
        cms.add("b", 5);
        cms.add("a", 2);
        assert!(cms.estimate("a") >= 5);
        assert!(cms.estimate("b") >= 5);
    }

    #[test]
    fn subtract_saturates_at_zero() {
        let mut a = CountMinSketch::new(2, 4);
        let mut b = CountMinSketch::new(2, 4);
        a.add("k", 3);
        b.add("k", 10);
        b.subtract(&a);
        assert_eq!(b.estimate("k"), 7);
        a.subtract(&b);
        // a had 3, subtracting (10-3)=7 saturates to 0, never wraps negative.
        assert_eq!(a.estimate("k"), 0);
    }

    #[test]
    fn retract_undoes_a_prior_add() {
        let mut cms = CountMinSketch::new(4, 32);
        cms.add("k", 5);
        let before = cms.estimate("other-key");
        cms.retract("k", 5);
        assert_eq!(cms.estimate("k"), 0);
        assert_eq!(cms.estimate("other-key"), before);
    }

    #[test]
    fn reset_zeroes_table() {
        let mut cms = CountMinSketch::new(3, 8);
        cms.add("x", 9);
        cms.reset();
        assert_eq!(cms.estimate("x"), 0);
    }

    proptest! {
        #[test]
        fn additivity_holds(a_counts in proptest::collection::vec(0u64..50, 0..20), b_counts in proptest::collection::vec(0u64..50, 0..20)) {
            let mut a = CountMinSketch::new(4, 32);
            let mut b = CountMinSketch::new(4, 32);
            for (i, &c) in a_counts.iter().enumerate() {
                a.add(&format!("key-{i}"), c);
            }
            for (i, &c) in b_counts.iter().enumerate() {
                b.add(&format!("key-{i}"), c);
            }
            let mut combined = a.clone();
            combined.add_sketch(&b);
            let max_len = a_counts.len().max(b_counts.len());
            for i in 0..max_len {
                let key = format!("key-{i}");
                prop_assert!(combined.estimate(&key) >= a.estimate(&key));
                prop_assert!(combined.estimate(&key) >= b.estimate(&key));
            }
        }

        #[test]
        fn cells_never_go_negative(deltas in proptest::collection::vec(0u64..100, 0..50)) {
            let mut cms = CountMinSketch::new(3, 16);
            for d in &deltas {
                cms.add("k", *d);
            }
            let total: u64 = deltas.iter().sum();
            let mut drain = CountMinSketch::new(3, 16);
            drain.add("k", total.saturating_add(1000));
            cms.subtract(&drain);
            assert_eq!(cms.estimate("k"), 0);
        }
    }
}
