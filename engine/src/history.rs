//! Bounded snapshot ring with a cursor for undo/redo and random jumps.
//!
//! Snapshots are deep copies taken after each committed step. Stepping while
//! the cursor sits mid-ring truncates the redo branch, matching the usual
//! editor undo model. The oldest snapshot falls off when the ring is full.

use std::collections::VecDeque;

/// Bounded history ring over deep-copied snapshots.
#[derive(Clone, Debug)]
pub struct History<T> {
    ring: VecDeque<T>,
    cursor: usize,
    capacity: usize,
}

impl<T: Clone> History<T> {
    /// New ring holding at most `capacity` snapshots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self { ring: VecDeque::with_capacity(capacity.max(1)), cursor: 0, capacity: capacity.max(1) }
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when no snapshot has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Cursor position within the ring.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Snapshot the cursor points at.
    pub fn current(&self) -> Option<&T> {
        self.ring.get(self.cursor)
    }

    /// Record a snapshot after the cursor, dropping any redo branch and the
    /// oldest entry once the ring is full.
    pub fn push(&mut self, snapshot: T) {
        if !self.ring.is_empty() {
            self.ring.truncate(self.cursor + 1);
        }
        self.ring.push_back(snapshot);
        if self.ring.len() > self.capacity {
            self.ring.pop_front();
        }
        self.cursor = self.ring.len() - 1;
    }

    /// Step the cursor back one snapshot. `None` at the oldest entry.
    pub fn undo(&mut self) -> Option<&T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.ring.get(self.cursor)
    }

    /// Step the cursor forward one snapshot. `None` at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.ring.len() {
            return None;
        }
        self.cursor += 1;
        self.ring.get(self.cursor)
    }

    /// Move the cursor to an absolute ring index.
    pub fn jump(&mut self, index: usize) -> Option<&T> {
        if index >= self.ring.len() {
            return None;
        }
        self.cursor = index;
        self.ring.get(self.cursor)
    }

    /// Drop everything. Used on full resets.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_walk() {
        let mut h = History::new(10);
        for i in 0..4 {
            h.push(i);
        }
        assert_eq!(h.current(), Some(&3));
        assert_eq!(h.undo(), Some(&2));
        assert_eq!(h.undo(), Some(&1));
        assert_eq!(h.redo(), Some(&2));
        assert_eq!(h.jump(0), Some(&0));
        assert_eq!(h.undo(), None);
        assert_eq!(h.redo(), Some(&1));
    }

    #[test]
    fn push_mid_ring_truncates_redo_branch() {
        let mut h = History::new(10);
        for i in 0..5 {
            h.push(i);
        }
        h.undo();
        h.undo();
        assert_eq!(h.current(), Some(&2));
        h.push(99);
        assert_eq!(h.len(), 4);
        assert_eq!(h.current(), Some(&99));
        assert_eq!(h.redo(), None);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = History::new(3);
        for i in 0..7 {
            h.push(i);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.jump(0), Some(&4));
        assert_eq!(h.jump(2), Some(&6));
    }

    #[test]
    fn undo_at_oldest_is_a_no_op() {
        let mut h = History::new(2);
        h.push(1);
        assert_eq!(h.undo(), None);
        assert_eq!(h.current(), Some(&1));
    }
}
