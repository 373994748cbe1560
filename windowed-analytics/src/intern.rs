//! String interning for hot keys.
//!
//! Domain façades that key on short, highly repeated strings (hashtags, event types, lot IDs)
//! benefit from sharing one allocation per distinct string rather than cloning a `String` on
//! every event. Grounded on `metrics::Key`'s `Arc<str>`-backed label sharing.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

/// An interned string: cheap to clone, compares by pointer-independent value equality.
pub type Interned = Arc<str>;

/// A thread-safe string interner.
///
/// Unbounded by design: the key space for a given façade instance (hashtags, lot IDs, event
/// types) is expected to be small and long-lived relative to the event stream volume. Façades
/// with a genuinely unbounded key space should hash keys instead of interning them.
pub struct Interner {
    table: Mutex<HashMap<Box<str>, Interned>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Interner { table: Mutex::new(HashMap::new()) }
    }

    /// Returns the interned `Arc<str>` for `value`, allocating one on first sight.
    pub fn intern(&self, value: &str) -> Interned {
        let mut table = self.table.lock();
        if let Some(existing) = table.get(value) {
            return Arc::clone(existing);
        }
        let interned: Interned = Arc::from(value);
        table.insert(value.into(), Arc::clone(&interned));
        interned
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_values_share_one_allocation() {
        let interner = Interner::new();
        let a = interner.intern("#ai");
        let b = interner.intern("#ai");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_values_get_distinct_entries() {
        let interner = Interner::new();
        interner.intern("#ai");
        interner.intern("#ml");
        assert_eq!(interner.len(), 2);
    }
}
