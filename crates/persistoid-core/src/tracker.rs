//! Dirty-key tracking between successive snapshots

use std::collections::{HashSet, VecDeque};

use crate::filter::KeyFilter;
use crate::snapshot::Snapshot;

/// FIFO queue of keys awaiting processing, without duplicates
#[derive(Debug, Clone, Default)]
pub struct DirtyQueue {
    order: VecDeque<String>,
    queued: HashSet<String>,
}

impl DirtyQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `key` unless it is already waiting; returns true if added
    pub fn push(&mut self, key: &str) -> bool {
        if self.queued.contains(key) {
            return false;
        }
        self.queued.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    /// Take the oldest key
    pub fn pop(&mut self) -> Option<String> {
        let key = self.order.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }

    /// Check whether `key` is waiting
    pub fn contains(&self, key: &str) -> bool {
        self.queued.contains(key)
    }

    /// Keys in processing order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of waiting keys
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check whether no key is waiting
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Compares each new snapshot against the previous one and queues changed keys
#[derive(Debug)]
pub struct DiffTracker<V> {
    last: Snapshot<V>,
    queue: DirtyQueue,
}

impl<V> DiffTracker<V> {
    /// Create a tracker whose previous snapshot is empty
    pub fn new() -> Self {
        Self {
            last: Snapshot::new(),
            queue: DirtyQueue::new(),
        }
    }

    /// Queue every eligible key whose value allocation changed, then adopt `next`
    ///
    /// Returns the number of keys newly queued.
    pub fn observe(&mut self, next: Snapshot<V>, filter: &KeyFilter) -> usize {
        let mut queued = 0;
        for (key, _) in next.iter() {
            if !filter.allows(key) || self.last.same_value(&next, key) {
                continue;
            }
            if self.queue.push(key) {
                queued += 1;
            }
        }
        self.last = next;
        queued
    }

    /// Latest snapshot seen
    pub fn last(&self) -> &Snapshot<V> {
        &self.last
    }

    /// Take the next dirty key
    pub fn next_dirty(&mut self) -> Option<String> {
        self.queue.pop()
    }

    /// Pending dirty keys
    pub fn queue(&self) -> &DirtyQueue {
        &self.queue
    }
}

impl<V> Default for DiffTracker<V> {
    fn default() -> Self {
        Self::new()
    }
}
