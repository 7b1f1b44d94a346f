//! Specialized collection types

use std::cmp::Ordering;
use std::ops::Range;

pub use slotmap::{Key, KeyData, SlotMap};

/// Encode a slot map key as a plain integer for byte payloads.
pub fn key_to_bits<K: Key>(key: K) -> u64 {
    key.data().as_ffi()
}

/// Decode a key written by [`key_to_bits`].
pub fn key_from_bits<K: Key + From<KeyData>>(bits: u64) -> K {
    KeyData::from_ffi(bits).into()
}

/// Fixed-capacity array written through a monotonically increasing cursor.
///
/// Slot `i` of the write sequence lands at `i % capacity`, so once the
/// capacity is exceeded the oldest entries are recycled instead of the
/// storage growing. Every recycled write is counted.
#[derive(Debug, Clone)]
pub struct RingArray<T> {
    slots: Vec<T>,
    capacity: usize,
    written: usize,
    overwritten: usize,
}

impl<T: Clone> RingArray<T> {
    /// Create an empty ring with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            written: 0,
            overwritten: 0,
        }
    }

    /// Append an entry, recycling the oldest slot once full.
    ///
    /// Returns the physical slot that was written.
    pub fn push(&mut self, value: T) -> usize {
        let slot = self.written % self.capacity;
        if slot < self.slots.len() {
            self.slots[slot] = value;
            self.overwritten += 1;
        } else {
            self.slots.push(value);
        }
        self.written += 1;
        slot
    }

    /// Total writes since the last clear, including recycled ones
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Writes that replaced an older entry
    pub const fn overwritten(&self) -> usize {
        self.overwritten
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Physical storage
    pub fn as_slice(&self) -> &[T] {
        &self.slots
    }

    /// Physical slots holding the logical write range `start..end`.
    ///
    /// Writes that were already recycled fall out of the front; the result
    /// is one or two runs of storage in write order.
    fn segments(&self, start: usize, end: usize) -> (Range<usize>, Range<usize>) {
        let end = end.min(self.written);
        let start = start.max(self.written.saturating_sub(self.capacity)).min(end);
        let head = start % self.capacity;
        let len = end - start;
        if head + len <= self.capacity {
            (head..head + len, 0..0)
        } else {
            (head..self.capacity, 0..head + len - self.capacity)
        }
    }

    /// Entries of the logical write range `start..end` that still exist, as
    /// two slices in write order
    pub fn range(&self, start: usize, end: usize) -> (&[T], &[T]) {
        let (first, second) = self.segments(start, end);
        (&self.slots[first], &self.slots[second])
    }

    /// Sort the surviving entries of `start..end` and store them back in
    /// write order
    pub fn sort_range_by<F>(&mut self, start: usize, end: usize, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let (first, second) = self.segments(start, end);
        if second.is_empty() {
            self.slots[first].sort_unstable_by(compare);
            return;
        }

        let mut scratch: Vec<T> = self.slots[first.clone()].iter().chain(&self.slots[second.clone()]).cloned().collect();
        scratch.sort_unstable_by(compare);
        let split = first.len();
        self.slots[first].clone_from_slice(&scratch[..split]);
        self.slots[second].clone_from_slice(&scratch[split..]);
    }

    /// Drop every entry and reset the counters
    pub fn clear(&mut self) {
        self.slots.clear();
        self.written = 0;
        self.overwritten = 0;
    }
}
