//! Bounded, per-key audit log.
//!
//! The warehouse façade (and any other façade that needs "what happened to this key recently")
//! uses this to keep a capped history without growing unboundedly: a bounded deque per key.

use std::collections::VecDeque;
use std::hash::Hash;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// The kind of operation recorded in an audit entry.
///
/// A closed tagged variant, not a stringly-typed op name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Stock (or equivalent quantity) was added.
    Add,
    /// Stock (or equivalent quantity) was removed.
    Remove,
    /// Stock moved from one location to another.
    Transfer,
}

/// One audit entry: when, what kind of operation, against which location(s), and how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry<L> {
    pub timestamp: i64,
    pub kind: OpKind,
    pub locations: (L, Option<L>),
    pub quantity: i64,
}

/// A bounded-per-key audit log: at most `capacity` most-recent entries are retained per key.
pub struct AuditLog<K: Eq + Hash + Clone, L: Clone> {
    capacity: usize,
    entries: Mutex<HashMap<K, VecDeque<AuditEntry<L>>>>,
}

impl<K: Eq + Hash + Clone, L: Clone> AuditLog<K, L> {
    /// Creates an audit log that keeps at most `capacity` entries per key.
    pub fn new(capacity: usize) -> Self {
        AuditLog { capacity, entries: Mutex::new(HashMap::new()) }
    }

    /// Appends one entry for `key`, evicting the oldest entry for that key if over capacity.
    pub fn record(&self, key: K, entry: AuditEntry<L>) {
        let mut entries = self.entries.lock();
        let deque = entries.entry(key).or_insert_with(VecDeque::new);
        if deque.len() >= self.capacity {
            deque.pop_front();
        }
        deque.push_back(entry);
    }

    /// Returns up to `limit` most-recent entries for `key`, newest first.
    pub fn recent(&self, key: &K, limit: usize) -> Vec<AuditEntry<L>> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(deque) => deque.iter().rev().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_add_stock_records_exactly_once() {
        // Applying the same stock addition twice with the same idempotency tuple should leave
        // exactly one audit entry, enforced by the caller's dedup cache before it ever calls
        // `record`.
        let log: AuditLog<u32, u32> = AuditLog::new(10);
        let entry =
            AuditEntry { timestamp: 100, kind: OpKind::Add, locations: (1, None), quantity: 10 };
        log.record(1, entry);
        assert_eq!(log.recent(&1, 10).len(), 1);
    }

    #[test]
    fn bounded_capacity_evicts_oldest() {
        let log: AuditLog<u32, u32> = AuditLog::new(2);
        for ts in [1, 2, 3] {
            log.record(
                1,
                AuditEntry { timestamp: ts, kind: OpKind::Add, locations: (1, None), quantity: 1 },
            );
        }
        let recent = log.recent(&1, 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, 3);
        assert_eq!(recent[1].timestamp, 2);
    }
}
