//! Generic priority queue keyed by `(priority, sequence)`.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Next submission sequence number. Shared by every enqueue in the process.
pub fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed)
}

struct Keyed<T> {
    priority: u8,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Keyed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Keyed<T> {}

impl<T> Ord for Keyed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl<T> PartialOrd for Keyed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Keyed<T> {
    fn key(&self) -> (u8, u64) {
        (self.priority, self.sequence)
    }
}

/// Min-queue: lowest priority value first, then lowest sequence (FIFO on ties).
pub struct PriorityQueue<T> {
    heap: BinaryHeap<Reverse<Keyed<T>>>,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Push with a fresh sequence number; returns the sequence assigned.
    pub fn push(&mut self, priority: u8, item: T) -> u64 {
        let sequence = next_sequence();
        self.push_with_sequence(priority, sequence, item);
        sequence
    }

    pub fn push_with_sequence(&mut self, priority: u8, sequence: u64, item: T) {
        self.heap.push(Reverse(Keyed {
            priority,
            sequence,
            item,
        }));
    }

    pub fn pop(&mut self) -> Option<(u8, u64, T)> {
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.priority, entry.sequence, entry.item))
    }

    /// Keep only the items for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.heap.retain(|Reverse(entry)| keep(&entry.item));
    }

    /// Items in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|Reverse(entry)| &entry.item)
    }

    pub fn peek_key(&self) -> Option<(u8, u64)> {
        self.heap.peek().map(|Reverse(entry)| entry.key())
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
