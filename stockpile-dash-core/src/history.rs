//! Bounded, newest-first event history.

use std::collections::VecDeque;

use crate::types::CacheEvent;

/// Default eviction threshold of the dashboard history.
pub const DEFAULT_CAPACITY: usize = 50;

/// Insertion-ordered buffer of events, newest first.
///
/// The capacity check runs before the new event is prepended, so eviction lags
/// insertion by one call and the buffer settles at `capacity + 1` entries.
#[derive(Debug, Clone)]
pub struct EventHistory<T = CacheEvent> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> Default for EventHistory<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T> EventHistory<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Prepends an event, evicting the oldest entry first if the history is
    /// already over capacity.
    pub fn insert(&mut self, event: T) {
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(event);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Eviction threshold (the steady-state length is one more).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entry at `index`, where 0 is the newest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Iterates newest to oldest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.entries.iter()
    }
}

impl<T: Clone> EventHistory<T> {
    /// Snapshot of the history, newest first.
    pub fn to_ordered_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let mut history: EventHistory<u32> = EventHistory::default();
        history.insert(1);
        history.insert(2);
        history.insert(3);

        assert_eq!(history.to_ordered_vec(), vec![3, 2, 1]);
        assert_eq!(history.get(0), Some(&3));
        assert_eq!(history.get(3), None);
    }

    #[test]
    fn test_length_never_exceeds_capacity_plus_one() {
        let mut history: EventHistory<u32> = EventHistory::default();
        for i in 0..500 {
            history.insert(i);
            assert!(history.len() <= DEFAULT_CAPACITY + 1);
        }
        assert_eq!(history.len(), 51);
    }

    #[test]
    fn test_eviction_lags_by_one_insert() {
        let mut history: EventHistory<u32> = EventHistory::with_capacity(3);
        for i in 1..=4 {
            history.insert(i);
        }
        // 4 > 3 is only noticed by the next insert
        assert_eq!(history.to_ordered_vec(), vec![4, 3, 2, 1]);

        history.insert(5);
        assert_eq!(history.to_ordered_vec(), vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_fifty_two_inserts_keep_the_newest_fifty_one() {
        let mut history: EventHistory<u32> = EventHistory::default();
        for i in 1..=52 {
            history.insert(i);
        }

        assert_eq!(history.len(), 51);
        let expected: Vec<u32> = (2..=52).rev().collect();
        assert_eq!(history.to_ordered_vec(), expected);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history: EventHistory<&str> = EventHistory::with_capacity(0);
        history.insert("a");
        history.insert("b");
        assert_eq!(history.to_ordered_vec(), vec!["b"]);
        assert!(!history.is_empty());
        assert_eq!(history.capacity(), 0);
    }
}
