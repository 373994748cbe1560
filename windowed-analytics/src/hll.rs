//! A single HyperLogLog sketch for approximate distinct-count.

use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Minimum supported precision.
pub const MIN_PRECISION: u8 = 4;
/// Maximum supported precision.
pub const MAX_PRECISION: u8 = 16;

/// A HyperLogLog sketch with `2^precision` registers.
///
/// Register math (index from the top `precision` bits, rho from leading zeros of the shifted
/// remainder, alpha-by-size bias correction, small-range linear-counting correction) is grounded
/// on the `sketch_oxide::SlidingHyperLogLog` reference implementation.
#[derive(Debug, Clone)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates an empty sketch. `precision` must be in `[MIN_PRECISION, MAX_PRECISION]`.
    pub fn new(precision: u8) -> Self {
        assert!(
            (MIN_PRECISION..=MAX_PRECISION).contains(&precision),
            "hll precision must be between {MIN_PRECISION} and {MAX_PRECISION}"
        );
        HyperLogLog { precision, registers: vec![0u8; 1usize << precision] }
    }

    fn hash<K: Hash + ?Sized>(key: &K) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Inserts `key` into the sketch.
    pub fn insert<K: Hash + ?Sized>(&mut self, key: &K) {
        let hash = Self::hash(key);
        self.insert_hash(hash);
    }

    fn insert_hash(&mut self, hash: u64) {
        let idx = (hash >> (64 - self.precision)) as usize;
        let w = (hash << self.precision) | (1u64 << (self.precision - 1));
        let rho = (w.leading_zeros() + 1) as u8;
        if rho > self.registers[idx] {
            self.registers[idx] = rho;
        }
    }

    /// Merges `other`'s registers into `self`, register-wise max. Both sketches must share the
    /// same precision.
    pub fn merge(&mut self, other: &HyperLogLog) {
        assert_eq!(self.precision, other.precision, "HLL precision mismatch");
        for (slot, other_slot) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *other_slot > *slot {
                *slot = *other_slot;
            }
        }
    }

    fn alpha(&self) -> f64 {
        let m = self.registers.len() as f64;
        match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        }
    }

    /// Estimated cardinality of the sketch.
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for &register in &self.registers {
            if register == 0 {
                zeros += 1;
            }
            sum += 2.0_f64.powi(-(register as i32));
        }

        let raw = self.alpha() * m * m / sum;
        if raw <= 2.5 * m && zeros > 0 {
            return m * (m / zeros as f64).ln();
        }
        raw
    }

    /// Whether every register is still at its initial zero value.
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&r| r == 0)
    }

    /// Precision this sketch was constructed with.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of registers, `2^precision`.
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Standard error of the estimate, `~= 1.04 / sqrt(num_registers)`.
    pub fn standard_error(&self) -> f64 {
        1.04 / (self.num_registers() as f64).sqrt()
    }

    /// Resets every register to zero, turning this sketch back into an empty one in place.
    pub fn reset(&mut self) {
        self.registers.iter_mut().for_each(|r| *r = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sketch_estimates_zero_ish() {
        let hll = HyperLogLog::new(10);
        assert!(hll.is_empty());
        assert!(hll.estimate() < 1.0);
    }

    #[test]
    fn estimate_is_within_standard_error_band() {
        let mut hll = HyperLogLog::new(14);
        for i in 0..5000u64 {
            hll.insert(&i);
        }
        let estimate = hll.estimate();
        let err = hll.standard_error();
        let relative = ((estimate - 5000.0) / 5000.0).abs();
        // allow a few standard errors of slack to keep the test non-flaky
        assert!(relative < err * 6.0, "estimate {estimate} too far from 5000 (err={err})");
    }

    #[test]
    fn merge_is_register_wise_max_and_monotone() {
        let mut a = HyperLogLog::new(12);
        let mut b = HyperLogLog::new(12);
        for i in 0..100u64 {
            a.insert(&i);
        }
        for i in 50..150u64 {
            b.insert(&i);
        }
        let before = a.estimate();
        a.merge(&b);
        assert!(a.estimate() >= before);
    }

    #[test]
    fn reset_empties_the_sketch() {
        let mut hll = HyperLogLog::new(8);
        hll.insert(&"x");
        hll.reset();
        assert!(hll.is_empty());
    }
}
