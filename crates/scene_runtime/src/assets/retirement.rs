//! Bounded retirement queue
//!
//! Superseded GPU resources may still be referenced by command streams that
//! are executing for earlier frames. Instead of destroying them on
//! replacement they wait here, oldest first, until the queue overflows.
//!
//! The bound is a frame-count heuristic, not a fence: nothing here knows
//! whether the GPU has actually finished with an entry when it is evicted.

use std::collections::VecDeque;

/// Bounded FIFO of superseded resources
#[derive(Debug)]
pub struct RetirementQueue<T> {
    entries: VecDeque<T>,
    capacity: usize,
    retired_total: u64,
    evicted_total: u64,
}

impl<T> RetirementQueue<T> {
    /// Create a queue holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            retired_total: 0,
            evicted_total: 0,
        }
    }

    /// Retire a resource, returning the oldest entry if the queue overflowed
    ///
    /// The caller owns destruction of the returned entry.
    pub fn retire(&mut self, item: T) -> Option<T> {
        self.entries.push_back(item);
        self.retired_total += 1;

        if self.entries.len() > self.capacity {
            self.evicted_total += 1;
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove every entry, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }

    /// Entries currently waiting, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of waiting entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of waiting entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever retired
    pub fn retired_total(&self) -> u64 {
        self.retired_total
    }

    /// Entries ever evicted
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }
}
