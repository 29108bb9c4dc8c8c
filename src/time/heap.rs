//! Deadline heap for the timer driver.
//!
//! A min-heap of `(deadline, slot, cycle)` entries. Re-arming a registration
//! pushes a new entry with a higher cycle instead of removing the old one;
//! the driver discards entries whose cycle no longer matches the slot.

use crate::types::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct DeadlineEntry {
    pub(crate) deadline: Time,
    pub(crate) slot: usize,
    pub(crate) cycle: u64,
    seq: u64,
}

impl Ord for DeadlineEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first, then FIFO).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for DeadlineEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of registration deadlines.
#[derive(Debug, Default)]
pub(crate) struct DeadlineHeap {
    heap: BinaryHeap<DeadlineEntry>,
    next_seq: u64,
}

impl DeadlineHeap {
    /// Number of entries, stale ones included.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn insert(&mut self, slot: usize, cycle: u64, deadline: Time) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(DeadlineEntry {
            deadline,
            slot,
            cycle,
            seq,
        });
    }

    pub(crate) fn peek(&self) -> Option<&DeadlineEntry> {
        self.heap.peek()
    }

    pub(crate) fn pop(&mut self) -> Option<DeadlineEntry> {
        self.heap.pop()
    }

    /// Pops the earliest entry if its deadline is `<= now`.
    pub(crate) fn pop_expired(&mut self, now: Time) -> Option<DeadlineEntry> {
        if self.heap.peek()?.deadline <= now {
            self.heap.pop()
        } else {
            None
        }
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_heap_has_nothing_to_pop() {
        let mut heap = DeadlineHeap::default();
        assert!(heap.is_empty());
        assert!(heap.peek().is_none());
        assert!(heap.pop_expired(Time::MAX).is_none());
    }

    #[test]
    fn orders_by_deadline() {
        let mut heap = DeadlineHeap::default();
        heap.insert(1, 0, Time::from_millis(200));
        heap.insert(2, 0, Time::from_millis(100));
        heap.insert(3, 0, Time::from_millis(150));

        assert_eq!(heap.peek().map(|e| e.slot), Some(2));
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn equal_deadlines_pop_in_insertion_order() {
        let mut heap = DeadlineHeap::default();
        heap.insert(7, 0, Time::from_millis(50));
        heap.insert(4, 0, Time::from_millis(50));
        heap.insert(9, 0, Time::from_millis(50));

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|e| e.slot)).collect();
        assert_eq!(order, vec![7, 4, 9]);
    }

    #[test]
    fn pop_expired_stops_at_future_deadline() {
        let mut heap = DeadlineHeap::default();
        heap.insert(1, 0, Time::from_millis(100));
        heap.insert(2, 0, Time::from_millis(200));
        heap.insert(3, 1, Time::from_millis(50));

        let first = heap.pop_expired(Time::from_millis(125)).map(|e| (e.slot, e.cycle));
        let second = heap.pop_expired(Time::from_millis(125)).map(|e| e.slot);
        assert_eq!(first, Some((3, 1)));
        assert_eq!(second, Some(1));
        assert!(heap.pop_expired(Time::from_millis(125)).is_none());
        assert_eq!(heap.peek().map(|e| e.deadline), Some(Time::from_millis(200)));

        heap.clear();
        assert!(heap.is_empty());
    }
}
