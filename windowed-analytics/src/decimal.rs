//! Fixed-decimal price rounding at a configured tick size.
//!
//! Prices are rounded with fixed-point decimal arithmetic and ROUND_HALF_UP to the tick size,
//! never raw floating-point comparison. This is the one piece of domain numeric semantics
//! promoted into the core, since every price-bearing façade (the order book) needs it identically.

use rust_decimal::{Decimal, RoundingStrategy};

/// A price tick: the smallest representable price increment.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    size: Decimal,
}

impl Tick {
    /// Creates a tick of the given size (e.g. `Decimal::new(1, 2)` for `0.01`).
    pub fn new(size: Decimal) -> Self {
        assert!(size > Decimal::ZERO, "tick size must be positive");
        Tick { size }
    }

    /// Rounds `price` to the nearest multiple of this tick, half rounding away from zero
    /// (ROUND_HALF_UP).
    pub fn round(&self, price: Decimal) -> Decimal {
        let quotient = (price / self.size).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        quotient * self.size
    }
}
