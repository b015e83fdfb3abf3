//! Bounded Sliding Window for Sensor History
//!
//! ## Overview
//!
//! Every stateful part of the monitor keeps a bounded, ordered history:
//! - the smoothing filter keeps the last few values of each slow channel
//! - the anomaly detector keeps its training window of channel triples
//! - the pipeline keeps a short history of filtered points for charting
//!
//! All of them want the same behaviour: append at the back, and once the
//! window is full, silently discard the oldest entry. Recent data is more
//! valuable than old data, so a full window is never an error.
//!
//! ## Why Runtime Capacity?
//!
//! Window sizes are configuration parameters (smoothing window, training
//! window, history length), so the capacity is chosen when the window is
//! created rather than fixed by a const generic.
//!
//! ```text
//! BoundedWindow (capacity 3):
//!
//! push 1  → [1]
//! push 2  → [1, 2]
//! push 3  → [1, 2, 3]      ← full
//! push 4  → [2, 3, 4]      ← 1 evicted
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use firewatch_core::buffer::BoundedWindow;
//!
//! let mut history = BoundedWindow::new(3);
//! for value in [21.0, 22.0, 23.0, 24.0] {
//!     history.push(value);
//! }
//!
//! assert_eq!(history.len(), 3);
//! assert_eq!(history.mean(), Some(23.0));
//! ```

use std::collections::VecDeque;

/// Fixed-capacity FIFO window that evicts the oldest entry on overflow
///
/// ## Internal Invariants
///
/// - `len() <= capacity()` at all times
/// - iteration yields entries oldest first, in insertion order
///
/// ## Thread Safety
///
/// This type is not synchronized. Owners that are shared across threads
/// must serialize access (see `pipeline::SharedPipeline`).
#[derive(Debug, Clone)]
pub struct BoundedWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedWindow<T> {
    /// Creates an empty window holding at most `capacity` entries
    ///
    /// A capacity of zero is raised to one so a push is never lost outright.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, returning the evicted oldest entry when the window was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };

        self.items.push_back(item);
        evicted
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if window is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if window is full
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate over entries from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + Clone + '_ {
        self.items.iter()
    }

    /// Drop all entries, keeping the capacity
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedWindow<T> {
    /// Copy the contents out, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl BoundedWindow<f64> {
    /// Arithmetic mean of the stored values, `None` when empty
    pub fn mean(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }

        Some(self.items.iter().sum::<f64>() / self.items.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window() {
        let window: BoundedWindow<f64> = BoundedWindow::new(5);
        assert!(window.is_empty());
        assert_eq!(window.len(), 0);
        assert!(window.last().is_none());
        assert!(window.mean().is_none());
    }

    #[test]
    fn push_and_retrieve() {
        let mut window = BoundedWindow::new(5);

        assert_eq!(window.push(25.0), None);
        assert_eq!(window.len(), 1);
        assert!(!window.is_empty());
        assert_eq!(window.last(), Some(&25.0));
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut window = BoundedWindow::new(3);

        for i in 0..3 {
            assert_eq!(window.push(i), None);
        }
        assert!(window.is_full());

        assert_eq!(window.push(3), Some(0));
        assert_eq!(window.push(4), Some(1));

        assert_eq!(window.len(), 3);
        assert_eq!(window.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn iterator_order() {
        let mut window = BoundedWindow::new(4);
        for i in 0..6u64 {
            window.push(i);
        }

        let ordered: Vec<u64> = window.iter().copied().collect();
        assert_eq!(ordered, vec![2, 3, 4, 5]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut window = BoundedWindow::new(0);
        window.push(1.5);
        window.push(2.5);

        assert_eq!(window.capacity(), 1);
        assert_eq!(window.mean(), Some(2.5));
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut window = BoundedWindow::new(2);
        window.push(1.0);
        window.push(2.0);
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.capacity(), 2);
    }
}
