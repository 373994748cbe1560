//! Multi-warehouse inventory system: exact stock tracking, atomic transfers, and an audit trail.
//!
//! Grounded on the `warehouse.py` reference, which specifies the API surface but leaves every
//! method unimplemented. The tracked quantities here have no time dimension -- stock either is or
//! isn't present -- so this façade composes [`windowed_analytics::ShardedLockMap`],
//! [`windowed_analytics::AuditLog`], [`windowed_analytics::DedupCache`], and
//! [`windowed_analytics::BoundedTopK`] directly rather than going through the rolling-window
//! `Analytics` façade.

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::trace;
use windowed_analytics::{AuditEntry, AuditLog, BoundedTopK, DedupCache, OpKind, ShardedLockMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdempotencyToken {
    Add { item_id: i64, warehouse_id: i64, quantity: i64, timestamp: i64 },
    Remove { item_id: i64, warehouse_id: i64, quantity: i64, timestamp: i64 },
    Transfer { item_id: i64, from: i64, to: i64, quantity: i64, timestamp: i64 },
}

/// Tracks per-warehouse stock for a set of items, with an audit trail and running rankings of
/// the busiest items and warehouses.
pub struct InventorySystem {
    stock: Mutex<HashMap<i64, HashMap<i64, i64>>>,
    audit: AuditLog<i64, i64>,
    dedup: DedupCache<IdempotencyToken>,
    item_transfer_counts: Mutex<HashMap<i64, i64>>,
    item_transfer_top_k: Mutex<BoundedTopK<i64>>,
    warehouse_movement: Mutex<HashMap<i64, i64>>,
    warehouse_movement_top_k: Mutex<BoundedTopK<i64>>,
    shards: ShardedLockMap,
}

impl InventorySystem {
    /// Creates an inventory system tracking the top `top_k_capacity` items/warehouses, an audit
    /// trail of `audit_capacity` entries per item, and idempotency memory for the last
    /// `dedup_capacity` distinct operations.
    pub fn new(top_k_capacity: usize, audit_capacity: usize, dedup_capacity: usize) -> Self {
        InventorySystem {
            stock: Mutex::new(HashMap::new()),
            audit: AuditLog::new(audit_capacity),
            dedup: DedupCache::new(dedup_capacity),
            item_transfer_counts: Mutex::new(HashMap::new()),
            item_transfer_top_k: Mutex::new(BoundedTopK::new(top_k_capacity)),
            warehouse_movement: Mutex::new(HashMap::new()),
            warehouse_movement_top_k: Mutex::new(BoundedTopK::new(top_k_capacity)),
            shards: ShardedLockMap::new(128),
        }
    }

    /// Adds `quantity` of `item_id` to `warehouse_id`, recording one audit entry.
    ///
    /// A repeat call with the exact same `(item_id, warehouse_id, quantity, timestamp)` is
    /// recognised as a retried duplicate and applied at most once.
    pub fn add_stock(&self, item_id: i64, quantity: i64, warehouse_id: i64, timestamp: i64) -> bool {
        let token = IdempotencyToken::Add { item_id, warehouse_id, quantity, timestamp };
        if !self.dedup.check_and_insert(token) {
            return true;
        }
        self.shards.with_lock(&warehouse_id, || {
            *self.stock.lock().entry(item_id).or_insert_with(HashMap::new).entry(warehouse_id).or_insert(0) +=
                quantity;
        });
        self.audit.record(
            item_id,
            AuditEntry { timestamp, kind: OpKind::Add, locations: (warehouse_id, None), quantity },
        );
        self.bump_warehouse_movement(warehouse_id, quantity);
        true
    }

    /// Removes `quantity` of `item_id` from `warehouse_id`. Returns `false` (no change applied)
    /// if the warehouse does not hold enough stock.
    pub fn remove_stock(&self, item_id: i64, quantity: i64, warehouse_id: i64, timestamp: i64) -> bool {
        let token = IdempotencyToken::Remove { item_id, warehouse_id, quantity, timestamp };
        if !self.dedup.check_and_insert(token) {
            return true;
        }
        let applied = self.shards.with_lock(&warehouse_id, || {
            let mut stock = self.stock.lock();
            let entry = stock.entry(item_id).or_insert_with(HashMap::new).entry(warehouse_id).or_insert(0);
            if *entry < quantity {
                trace!(item_id, warehouse_id, quantity, available = *entry, "rejecting remove_stock: insufficient stock");
                return false;
            }
            *entry -= quantity;
            true
        });
        if applied {
            self.audit.record(
                item_id,
                AuditEntry { timestamp, kind: OpKind::Remove, locations: (warehouse_id, None), quantity },
            );
            self.bump_warehouse_movement(warehouse_id, quantity);
        }
        applied
    }

    /// Moves `quantity` of `item_id` from `from_warehouse` to `to_warehouse`, atomically: a
    /// reader never observes the quantity missing from both warehouses, or present in both.
    /// Returns `false` (no change applied) if the source warehouse does not hold enough stock.
    pub fn transfer_stock(
        &self,
        item_id: i64,
        from_warehouse: i64,
        to_warehouse: i64,
        quantity: i64,
        timestamp: i64,
    ) -> bool {
        let token = IdempotencyToken::Transfer { item_id, from: from_warehouse, to: to_warehouse, quantity, timestamp };
        if !self.dedup.check_and_insert(token) {
            return true;
        }
        let applied = self.shards.with_two_locks(&from_warehouse, &to_warehouse, || {
            let mut stock = self.stock.lock();
            let from_qty =
                *stock.entry(item_id).or_insert_with(HashMap::new).entry(from_warehouse).or_insert(0);
            if from_qty < quantity {
                trace!(item_id, from_warehouse, to_warehouse, quantity, available = from_qty, "rejecting transfer_stock: insufficient stock");
                return false;
            }
            *stock.get_mut(&item_id).unwrap().get_mut(&from_warehouse).unwrap() -= quantity;
            *stock.get_mut(&item_id).unwrap().entry(to_warehouse).or_insert(0) += quantity;
            true
        });
        if applied {
            self.audit.record(
                item_id,
                AuditEntry {
                    timestamp,
                    kind: OpKind::Transfer,
                    locations: (from_warehouse, Some(to_warehouse)),
                    quantity,
                },
            );
            self.bump_item_transfer_count(item_id);
            self.bump_warehouse_movement(from_warehouse, quantity);
            self.bump_warehouse_movement(to_warehouse, quantity);
        }
        applied
    }

    fn bump_warehouse_movement(&self, warehouse_id: i64, quantity: i64) {
        let mut counts = self.warehouse_movement.lock();
        let total = counts.entry(warehouse_id).or_insert(0);
        *total += quantity;
        let score = *total;
        drop(counts);
        self.warehouse_movement_top_k.lock().set(warehouse_id, score);
    }

    fn bump_item_transfer_count(&self, item_id: i64) {
        let mut counts = self.item_transfer_counts.lock();
        let total = counts.entry(item_id).or_insert(0);
        *total += 1;
        let score = *total;
        drop(counts);
        self.item_transfer_top_k.lock().set(item_id, score);
    }

    /// Total stock of `item_id` across every warehouse.
    pub fn get_global_stock(&self, item_id: i64) -> i64 {
        self.stock.lock().get(&item_id).map(|per_warehouse| per_warehouse.values().sum()).unwrap_or(0)
    }

    /// Stock of `item_id` in `warehouse_id` specifically.
    pub fn get_warehouse_stock(&self, item_id: i64, warehouse_id: i64) -> i64 {
        self.stock.lock().get(&item_id).and_then(|per_warehouse| per_warehouse.get(&warehouse_id)).copied().unwrap_or(0)
    }

    /// The top `k` items by number of transfer operations they have been involved in.
    pub fn get_most_transferred_items(&self, k: usize) -> Vec<i64> {
        let mut snapshot = self.item_transfer_top_k.lock().snapshot();
        snapshot.truncate(k);
        snapshot.into_iter().map(|(item_id, _)| item_id).collect()
    }

    /// The top `k` warehouses by total stock movement (sum of add/remove/transfer quantities).
    pub fn get_most_active_warehouses(&self, k: usize) -> Vec<i64> {
        let mut snapshot = self.warehouse_movement_top_k.lock().snapshot();
        snapshot.truncate(k);
        snapshot.into_iter().map(|(warehouse_id, _)| warehouse_id).collect()
    }

    /// `{warehouse_id: quantity}` for every warehouse currently holding stock of `item_id`.
    pub fn get_stock_distribution(&self, item_id: i64) -> HashMap<i64, i64> {
        self.stock.lock().get(&item_id).cloned().unwrap_or_default()
    }

    /// Up to `limit` most recent audit entries for `item_id`, newest first.
    pub fn get_audit_log(&self, item_id: i64, limit: usize) -> Vec<AuditEntry<i64>> {
        self.audit.recent(&item_id, limit)
    }
}
