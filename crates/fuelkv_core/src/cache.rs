//! Bounded write cache shared by both backends.

use fuelkv_codec::Value;
use std::collections::BTreeMap;

/// Pending writes not yet persisted.
///
/// Entries are kept in key order so flushes write deterministically. The
/// cache never evicts on its own: [`insert`](Self::insert) reports when the
/// capacity is reached and the owner flushes, then calls
/// [`clear`](Self::clear) once the flush succeeded.
#[derive(Debug, Clone)]
pub(crate) struct WriteCache {
    entries: BTreeMap<String, Value>,
    capacity: usize,
}

impl WriteCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts or replaces a pending value. Returns `true` when the cache
    /// is now full and should be flushed.
    pub(crate) fn insert(&mut self, key: String, value: Value) -> bool {
        self.entries.insert(key, value);
        self.is_full()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
