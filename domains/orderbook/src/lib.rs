//! Memory-bounded rolling order book.
//!
//! Grounded on the `orderbook.py` reference: orders are tick-rounded to a price level via
//! [`windowed_analytics::Tick`], price-level quantity is exact (a `BTreeMap<Decimal, i64>` for
//! range queries), and the running top-K price levels are tracked incrementally with
//! [`windowed_analytics::BoundedTopK`] rather than recomputed per query.
//!
//! An order move between price levels (an update that changes price) is the two-key atomic
//! operation in this façade: the old level's quantity and the new level's quantity are adjusted
//! under both price stripes held at once, via [`ShardedLockMap::with_two_locks`], so a concurrent
//! reader never observes the quantity having left the old level without yet having arrived at the
//! new one.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::trace;
use windowed_analytics::{BoundedTopK, ShardedLockMap, Tick};

#[derive(Debug, Clone, Copy)]
struct Order {
    price: Decimal,
    quantity: i64,
    timestamp: i64,
}

/// A tick-rounded order book supporting exact per-level and ranged quantity queries plus a
/// running top-K of the busiest price levels.
pub struct OrderBook {
    tick: Tick,
    orders: Mutex<HashMap<String, Order>>,
    price_levels: Mutex<BTreeMap<Decimal, i64>>,
    top_k: Mutex<BoundedTopK<Decimal>>,
    shards: ShardedLockMap,
}

impl OrderBook {
    /// Creates an order book that rounds every price to `tick_size` and tracks the busiest
    /// `top_k_capacity` price levels.
    pub fn new(tick_size: Decimal, top_k_capacity: usize) -> Self {
        OrderBook {
            tick: Tick::new(tick_size),
            orders: Mutex::new(HashMap::new()),
            price_levels: Mutex::new(BTreeMap::new()),
            top_k: Mutex::new(BoundedTopK::new(top_k_capacity)),
            shards: ShardedLockMap::new(128),
        }
    }

    /// Creates or updates `order_id` at `price`/`quantity` as of `timestamp`.
    ///
    /// If `order_id` already exists, this is an update: the order's prior contribution is moved
    /// out of its old price level and the new one applied, atomically with respect to readers of
    /// either level. A timestamp that does not strictly advance the order's last-seen timestamp
    /// is a stale write and is dropped, returning `false`.
    pub fn record_order(&self, order_id: &str, price: Decimal, quantity: i64, timestamp: i64) -> bool {
        self.apply_order(order_id, price, quantity, timestamp)
    }

    /// Alias for [`Self::record_order`]: updating an order is recording it again under the same
    /// `order_id`, just as the reference system treats the two the same way.
    pub fn update_order(&self, order_id: &str, new_price: Decimal, new_quantity: i64, timestamp: i64) -> bool {
        self.apply_order(order_id, new_price, new_quantity, timestamp)
    }

    fn apply_order(&self, order_id: &str, price: Decimal, quantity: i64, timestamp: i64) -> bool {
        let rounded = self.tick.round(price);
        let mut orders = self.orders.lock();
        let previous = orders.get(order_id).copied();

        if let Some(existing) = previous {
            if timestamp <= existing.timestamp {
                trace!(order_id, timestamp, last_seen = existing.timestamp, "dropping stale order write");
                return false;
            }
            self.shards.with_two_locks(&existing.price, &rounded, || {
                self.adjust_level(existing.price, -existing.quantity);
                self.adjust_level(rounded, quantity);
            });
        } else {
            self.shards.with_lock(&rounded, || {
                self.adjust_level(rounded, quantity);
            });
        }

        orders.insert(order_id.to_string(), Order { price: rounded, quantity, timestamp });
        true
    }

    /// Removes `order_id` from the book as of `timestamp`. A no-op if the order is unknown or
    /// `timestamp` does not strictly advance past the order's last write.
    pub fn cancel_order(&self, order_id: &str, timestamp: i64) -> bool {
        let mut orders = self.orders.lock();
        let Some(existing) = orders.get(order_id).copied() else {
            trace!(order_id, "cancelling an unknown order");
            return false;
        };
        if timestamp <= existing.timestamp {
            trace!(order_id, timestamp, last_seen = existing.timestamp, "dropping stale cancel");
            return false;
        }
        self.shards.with_lock(&existing.price, || {
            self.adjust_level(existing.price, -existing.quantity);
        });
        orders.remove(order_id);
        true
    }

    fn adjust_level(&self, price: Decimal, delta: i64) {
        let mut levels = self.price_levels.lock();
        let entry = levels.entry(price).or_insert(0);
        *entry += delta;
        let quantity = *entry;
        if quantity <= 0 {
            levels.remove(&price);
        }
        drop(levels);
        self.top_k.lock().set(price, quantity.max(0));
    }

    /// Total quantity resting at the price level `price` rounds to. `0` if the level is empty.
    pub fn get_total_quantity(&self, price: Decimal) -> i64 {
        let rounded = self.tick.round(price);
        *self.price_levels.lock().get(&rounded).unwrap_or(&0)
    }

    /// Total quantity across every price level in `[low, high]` (inclusive, both tick-rounded).
    pub fn get_total_quantity_in_range(&self, low: Decimal, high: Decimal) -> i64 {
        let low = self.tick.round(low);
        let high = self.tick.round(high);
        self.price_levels.lock().range(low..=high).map(|(_, qty)| *qty).sum()
    }

    /// Up to `k` price levels by total quantity, descending.
    pub fn get_top_k_prices(&self, k: usize) -> Vec<(Decimal, i64)> {
        let mut snapshot = self.top_k.lock().snapshot();
        snapshot.truncate(k);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_book_update_moves_quantity_between_levels() {
        let book = OrderBook::new(dec!(0.01), 5);
        assert!(book.record_order("o1", dec!(100.5), 10, 100));
        assert!(book.record_order("o2", dec!(100.5), 10, 120));
        assert!(book.update_order("o1", dec!(101.0), 10, 130));

        assert_eq!(book.get_total_quantity(dec!(100.50)), 10);
        assert_eq!(book.get_total_quantity(dec!(101.00)), 10);

        // Stale update, strictly before o1's last-applied timestamp, is dropped.
        assert!(!book.update_order("o1", dec!(99.0), 10, 105));
        assert_eq!(book.get_total_quantity(dec!(101.00)), 10);
    }

    #[test]
    fn range_query_sums_every_covered_level() {
        let book = OrderBook::new(dec!(0.01), 5);
        book.record_order("a", dec!(100.00), 5, 1);
        book.record_order("b", dec!(100.50), 7, 2);
        book.record_order("c", dec!(101.00), 3, 3);
        assert_eq!(book.get_total_quantity_in_range(dec!(100.00), dec!(100.50)), 12);
        assert_eq!(book.get_total_quantity_in_range(dec!(100.00), dec!(101.00)), 15);
    }

    #[test]
    fn cancel_removes_quantity_and_empties_level() {
        let book = OrderBook::new(dec!(0.01), 5);
        book.record_order("a", dec!(100.00), 5, 1);
        assert!(book.cancel_order("a", 2));
        assert_eq!(book.get_total_quantity(dec!(100.00)), 0);
        assert!(book.get_top_k_prices(5).is_empty());
    }

    #[test]
    fn top_k_prices_tracks_the_busiest_levels() {
        let book = OrderBook::new(dec!(1), 2);
        book.record_order("a", dec!(10), 3, 1);
        book.record_order("b", dec!(11), 9, 2);
        book.record_order("c", dec!(12), 1, 3);
        let top = book.get_top_k_prices(2);
        assert_eq!(top[0], (dec!(11), 9));
        assert_eq!(top[1], (dec!(10), 3));
    }

    #[test]
    fn cancelling_an_unknown_order_is_a_noop() {
        let book = OrderBook::new(dec!(0.01), 5);
        assert!(!book.cancel_order("ghost", 1));
    }
}
