//! Query planning and result types for reading a channel.
//!
//! This module holds the pure parts of the read path: choosing which pyramid
//! level answers an interval query, working out which of that level's buckets
//! lie entirely inside the interval, and the types handed back to callers.
//!
//! # Interval queries
//!
//! An interval `[x_lo, x_hi]` is answered in three parts:
//!
//! ```text
//!  x_lo                                                     x_hi
//!   |--edge--|====bucket====|====bucket====|====bucket====|--edge--|
//!   raw walk      level-k summaries (merged as a whole)      raw walk
//! ```
//!
//! The level is the coarsest one whose bucket width still fits in the
//! interval. Edge regions are walked at level 0, so their cost depends on the
//! bucket width, not on how wide the query is.

use std::collections::vec_deque;
use std::ops::Range;

use crate::pyramid::Geometry;
use crate::sample::Sample;
use crate::summary::IntervalSummary;

/// Picks the highest summary level whose bucket width fits in `span`.
///
/// Level `k` has width `base_width * 2^(k-1)`. Returns 0 (raw level only)
/// when even level 1 is wider than the span or no summary level exists.
///
/// # Examples
///
/// ```rust
/// use rtgraph::query::select_level;
///
/// // Widths 1, 2, 4, 8 for levels 1..=4
/// assert_eq!(select_level(0.5, 1.0, 4), 0);
/// assert_eq!(select_level(1.0, 1.0, 4), 1);
/// assert_eq!(select_level(5.0, 1.0, 4), 3);
/// assert_eq!(select_level(100.0, 1.0, 4), 4);
/// ```
pub fn select_level(span: f64, base_width: f64, level_count: usize) -> usize {
    if level_count == 0 || span.is_nan() || span < base_width {
        return 0;
    }

    let mut level = 1;
    let mut width = base_width;
    while level < level_count && width * 2.0 <= span {
        level += 1;
        width *= 2.0;
    }
    level
}

/// Bucket indices at `level` whose half-open extent lies inside `[x_lo, x_hi]`.
///
/// Returns `(first, last)` inclusive, or `None` if no bucket fits.
#[allow(clippy::cast_possible_truncation)] // float-to-int casts saturate
pub fn full_bucket_span(x_lo: f64, x_hi: f64, geometry: &Geometry, level: usize) -> Option<(i64, i64)> {
    let width = geometry.level_width(level);
    let first = ((x_lo - geometry.origin()) / width).ceil() as i64;
    let last = (((x_hi - geometry.origin()) / width).floor() as i64).saturating_sub(1);
    (first <= last).then_some((first, last))
}

/// The part of an interval answered from summary buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddleSpan {
    /// First bucket index (inclusive) at the plan's level.
    pub first_bucket: i64,
    /// Last bucket index (inclusive) at the plan's level.
    pub last_bucket: i64,
    /// Indices into the level's closed entries covering those buckets.
    pub entries: Range<usize>,
}

/// How an interval query will be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPlan {
    /// Summary level used for the middle region; 0 when the raw level
    /// answers the whole interval.
    pub level: usize,
    /// Bucket span merged from the summary level, if any.
    pub middle: Option<MiddleSpan>,
}

impl IntervalPlan {
    /// A plan that walks the raw level only.
    pub fn raw_only() -> Self {
        Self {
            level: 0,
            middle: None,
        }
    }
}

/// Result of an interval query, with metadata about how it was answered.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalQuery {
    /// The aggregate over the requested interval.
    pub summary: IntervalSummary,
    /// Which summary level answered the middle region (0 = raw only).
    pub level_used: usize,
    /// How many summary entries were merged.
    pub buckets_merged: usize,
    /// How many raw samples were walked at the edges.
    pub raw_samples_scanned: usize,
}

/// Lazy iterator over the raw samples in an x range, oldest first.
#[derive(Debug, Clone)]
pub struct SampleRange<'a> {
    inner: vec_deque::Iter<'a, Sample>,
}

impl<'a> SampleRange<'a> {
    pub(crate) fn new(inner: vec_deque::Iter<'a, Sample>) -> Self {
        Self { inner }
    }
}

impl Iterator for SampleRange<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for SampleRange<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().copied()
    }
}

impl ExactSizeIterator for SampleRange<'_> {}
