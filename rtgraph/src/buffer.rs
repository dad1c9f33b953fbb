//! Ordered ring-buffer storage for one resolution level.
//!
//! A [`SampleBuffer`] holds the entries of a single pyramid level: raw
//! samples at level 0, closed summary entries above it. Entries are kept in
//! non-decreasing position order, which makes every lookup a binary search.
//!
//! # Design
//!
//! The buffer wraps a `VecDeque` so that both ends are cheap:
//! - Appends go to the back in O(1) amortized
//! - Capacity eviction pops from the front in O(1) per entry (moving head)
//! - Lookups use `partition_point` over the logical order, O(log n)
//!
//! Appending an entry that precedes the current last entry is rejected with
//! [`InsertError::OutOfOrder`]. The only way to store such an entry is
//! [`SampleBuffer::insert_sorted`], an O(n) path the pyramid uses before a
//! full rebuild.

use std::collections::VecDeque;
use std::collections::vec_deque;
use std::ops::Range;

use crate::error::{InsertError, Result};

/// Anything stored in a [`SampleBuffer`] exposes the x position it is sorted by.
pub trait Positioned {
    /// The x position used for ordering and lookup.
    fn position(&self) -> f64;
}

/// Ordered storage of one resolution level.
///
/// # Thread Safety
///
/// The buffer is not internally synchronized. It is owned by a single writer;
/// readers borrow it immutably.
#[derive(Debug, Clone)]
pub struct SampleBuffer<T> {
    entries: VecDeque<T>,
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<T: Positioned> SampleBuffer<T> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends an entry at the back.
    ///
    /// Equal positions are accepted; only strictly smaller ones are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError::OutOfOrder`] if the entry's position is less than
    /// the position of the last stored entry. The buffer is left unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rtgraph::buffer::SampleBuffer;
    /// use rtgraph::sample::Sample;
    ///
    /// let mut buffer = SampleBuffer::new();
    /// buffer.append(Sample::new(1.0, 10.0)).unwrap();
    /// buffer.append(Sample::new(2.0, 20.0)).unwrap();
    /// assert!(buffer.append(Sample::new(1.5, 15.0)).is_err());
    /// assert_eq!(buffer.len(), 2);
    /// ```
    pub fn append(&mut self, entry: T) -> Result<()> {
        if let Some(last) = self.entries.back() {
            let x = entry.position();
            let last_x = last.position();
            if x < last_x {
                return Err(InsertError::OutOfOrder { x, last_x }.into());
            }
        }

        self.entries.push_back(entry);
        Ok(())
    }

    /// Inserts an entry at its sorted position, after any equal positions.
    ///
    /// This is O(n) and meant for rare out-of-order data only.
    pub fn insert_sorted(&mut self, entry: T) -> usize {
        let x = entry.position();
        let index = self.entries.partition_point(|e| e.position() <= x);
        self.entries.insert(index, entry);
        index
    }

    /// Appends without the ordering check.
    ///
    /// Callers guarantee the entry does not precede the last one.
    pub(crate) fn push_back(&mut self, entry: T) {
        debug_assert!(
            self.entries
                .back()
                .is_none_or(|last| last.position() <= entry.position()),
            "entries must be appended in position order"
        );
        self.entries.push_back(entry);
    }

    /// Number of leading entries for which `pred` holds.
    ///
    /// `pred` must be true for a prefix of the buffer and false afterwards.
    pub fn partition_point<P>(&self, pred: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        self.entries.partition_point(pred)
    }

    /// Index of the last entry with position ≤ `x`, or `None` if `x`
    /// precedes all data.
    pub fn find_at_or_before(&self, x: f64) -> Option<usize> {
        self.entries
            .partition_point(|e| e.position() <= x)
            .checked_sub(1)
    }

    /// Index of the first entry with position ≥ `x`, or `None` if `x`
    /// follows all data.
    pub fn find_at_or_after(&self, x: f64) -> Option<usize> {
        let index = self.entries.partition_point(|e| e.position() < x);
        (index < self.entries.len()).then_some(index)
    }

    /// Index of the last entry with position strictly less than `x`.
    pub fn find_before(&self, x: f64) -> Option<usize> {
        self.entries
            .partition_point(|e| e.position() < x)
            .checked_sub(1)
    }

    /// Index of the first entry with position strictly greater than `x`.
    pub fn find_after(&self, x: f64) -> Option<usize> {
        let index = self.entries.partition_point(|e| e.position() <= x);
        (index < self.entries.len()).then_some(index)
    }

    /// Index span of the entries with `lo <= position <= hi`
    /// (`< hi` when `hi_inclusive` is false).
    pub fn index_range(&self, lo: f64, hi: f64, hi_inclusive: bool) -> Range<usize> {
        let start = self.entries.partition_point(|e| e.position() < lo);
        let end = if hi_inclusive {
            self.entries.partition_point(|e| e.position() <= hi)
        } else {
            self.entries.partition_point(|e| e.position() < hi)
        };
        start..end.max(start)
    }

    /// Removes up to `n` of the oldest entries and returns how many were removed.
    pub fn evict_oldest(&mut self, n: usize) -> usize {
        let n = n.min(self.entries.len());
        self.entries.drain(..n);
        n
    }

    /// Removes and returns the oldest entry.
    pub fn pop_oldest(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Returns the entry at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    /// Returns the oldest entry.
    pub fn first(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Returns the newest entry.
    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Returns the number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries, oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.entries.iter()
    }

    /// Iterates over the entries in an index span, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds, like slice indexing.
    pub fn range(&self, indices: Range<usize>) -> vec_deque::Iter<'_, T> {
        self.entries.range(indices)
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a, T> IntoIterator for &'a SampleBuffer<T> {
    type Item = &'a T;
    type IntoIter = vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RtgError;
    use crate::sample::Sample;

    fn buffer_with(xs: &[f64]) -> SampleBuffer<Sample> {
        let mut buffer = SampleBuffer::new();
        for &x in xs {
            buffer.append(Sample::new(x, x * 10.0)).unwrap();
        }
        buffer
    }

    #[test]
    fn test_empty_buffer() {
        let buffer: SampleBuffer<Sample> = SampleBuffer::new();

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.first(), None);
        assert_eq!(buffer.last(), None);
        assert_eq!(buffer.find_at_or_before(1.0), None);
        assert_eq!(buffer.find_at_or_after(1.0), None);
        assert_eq!(buffer.index_range(0.0, 10.0, true), 0..0);
    }

    #[test]
    fn test_append_in_order() {
        let buffer = buffer_with(&[1.0, 2.0, 2.0, 3.0]);

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.first().unwrap().x, 1.0);
        assert_eq!(buffer.last().unwrap().x, 3.0);
    }

    #[test]
    fn test_append_out_of_order() {
        let mut buffer = buffer_with(&[1.0, 3.0]);

        let err = buffer.append(Sample::new(2.0, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            RtgError::Insert(InsertError::OutOfOrder { x, last_x }) if x == 2.0 && last_x == 3.0
        ));

        // Buffer is untouched
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.last().unwrap().x, 3.0);
    }

    #[test]
    fn test_find_at_or_before_and_after() {
        let buffer = buffer_with(&[1.0, 2.0, 4.0]);

        assert_eq!(buffer.find_at_or_before(0.5), None);
        assert_eq!(buffer.find_at_or_before(1.0), Some(0));
        assert_eq!(buffer.find_at_or_before(3.0), Some(1));
        assert_eq!(buffer.find_at_or_before(9.0), Some(2));

        assert_eq!(buffer.find_at_or_after(0.5), Some(0));
        assert_eq!(buffer.find_at_or_after(2.0), Some(1));
        assert_eq!(buffer.find_at_or_after(3.0), Some(2));
        assert_eq!(buffer.find_at_or_after(4.5), None);
    }

    #[test]
    fn test_strict_finds() {
        let buffer = buffer_with(&[1.0, 2.0, 4.0]);

        assert_eq!(buffer.find_before(1.0), None);
        assert_eq!(buffer.find_before(2.0), Some(0));
        assert_eq!(buffer.find_after(2.0), Some(2));
        assert_eq!(buffer.find_after(4.0), None);
    }

    #[test]
    fn test_finds_with_duplicates() {
        let buffer = buffer_with(&[1.0, 2.0, 2.0, 2.0, 3.0]);

        // Last of the equal run / first of the equal run
        assert_eq!(buffer.find_at_or_before(2.0), Some(3));
        assert_eq!(buffer.find_at_or_after(2.0), Some(1));
    }

    #[test]
    fn test_index_range() {
        let buffer = buffer_with(&[0.0, 1.0, 2.0, 3.0, 4.0]);

        assert_eq!(buffer.index_range(1.0, 3.0, true), 1..4);
        assert_eq!(buffer.index_range(1.0, 3.0, false), 1..3);
        assert_eq!(buffer.index_range(0.5, 0.7, true), 1..1);
        assert_eq!(buffer.index_range(-5.0, 10.0, true), 0..5);

        let xs: Vec<f64> = buffer.range(1..4).map(|s| s.x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_evict_oldest() {
        let mut buffer = buffer_with(&[0.0, 1.0, 2.0, 3.0]);

        assert_eq!(buffer.evict_oldest(2), 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.first().unwrap().x, 2.0);

        // Lookups follow the moving head
        assert_eq!(buffer.find_at_or_before(2.5), Some(0));

        assert_eq!(buffer.evict_oldest(10), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_eviction_then_append_wraps() {
        let mut buffer = SampleBuffer::with_capacity(4);
        for i in 0..100 {
            buffer.append(Sample::new(f64::from(i), 0.0)).unwrap();
            if buffer.len() > 4 {
                buffer.pop_oldest();
            }
        }

        let xs: Vec<f64> = buffer.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![96.0, 97.0, 98.0, 99.0]);
    }

    #[test]
    fn test_insert_sorted() {
        let mut buffer = buffer_with(&[1.0, 2.0, 4.0]);

        assert_eq!(buffer.insert_sorted(Sample::new(3.0, 0.0)), 2);
        assert_eq!(buffer.insert_sorted(Sample::new(0.0, 0.0)), 0);
        // Equal positions go after the existing run
        assert_eq!(buffer.insert_sorted(Sample::new(2.0, 99.0)), 3);

        let xs: Vec<f64> = buffer.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.get(3).unwrap().y, 99.0);
    }
}
