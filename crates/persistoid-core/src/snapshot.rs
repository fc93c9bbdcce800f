//! Immutable state snapshots with shared values
//!
//! A [`Snapshot`] is what a host hands to the engine on every state change.
//! Values live behind `Arc`s and change detection compares those pointers,
//! never the contents: deriving the next snapshot from the previous one with
//! [`Snapshot::with`] or [`Snapshot::without`] keeps untouched values shared,
//! so only the keys actually replaced are reprocessed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Immutable mapping of state keys to shared values
pub struct Snapshot<V> {
    entries: Arc<BTreeMap<String, Arc<V>>>,
}

impl<V> Snapshot<V> {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self {
            entries: Arc::new(BTreeMap::new()),
        }
    }

    /// Derive a snapshot with `key` set to a freshly allocated value
    pub fn with(self, key: impl Into<String>, value: V) -> Self {
        self.with_shared(key, Arc::new(value))
    }

    /// Derive a snapshot with `key` set to an existing shared value
    pub fn with_shared(mut self, key: impl Into<String>, value: Arc<V>) -> Self {
        Arc::make_mut(&mut self.entries).insert(key.into(), value);
        self
    }

    /// Derive a snapshot without `key`
    pub fn without(mut self, key: &str) -> Self {
        if self.entries.contains_key(key) {
            Arc::make_mut(&mut self.entries).remove(key);
        }
        self
    }

    /// Shared value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Arc<V>> {
        self.entries.get(key)
    }

    /// Check whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<V>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when both snapshots are the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// True when `key` maps to the very same value allocation in both snapshots
    pub fn same_value(&self, other: &Self, key: &str) -> bool {
        match (self.get(key), other.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for Snapshot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for Snapshot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Snapshot<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), Arc::new(v)))
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }
}
