//! Aggregate value types produced by the pyramid.
//!
//! An [`IntervalSummary`] is the mean/min/max/count of a contiguous run of
//! raw samples. Summaries combine associatively, so a summary of a span can be
//! built from the summaries of any partition of that span. The pyramid relies
//! on this both when propagating closed buckets upward and when answering
//! interval queries from a mix of coarse buckets and raw edge samples.

use serde::{Deserialize, Serialize};

use crate::buffer::Positioned;
use crate::sample::Sample;

/// Aggregate of a contiguous run of raw samples.
///
/// Invariants: `x_start <= x_end`, `min <= mean <= max`, `count >= 1`.
/// `x_start` and `x_end` are the positions of the first and last raw sample
/// covered, not the bucket bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalSummary {
    /// Position of the first sample covered.
    pub x_start: f64,
    /// Position of the last sample covered.
    pub x_end: f64,
    /// Arithmetic mean of the covered values.
    pub mean: f64,
    /// Smallest covered value.
    pub min: f64,
    /// Largest covered value.
    pub max: f64,
    /// Number of raw samples covered.
    pub count: u64,
}

impl IntervalSummary {
    /// Summary of a single sample.
    pub fn from_sample(sample: Sample) -> Self {
        Self {
            x_start: sample.x,
            x_end: sample.x,
            mean: sample.y,
            min: sample.y,
            max: sample.y,
            count: 1,
        }
    }

    /// Builds a summary from an ordered run of samples.
    ///
    /// Returns `None` for an empty run.
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut iter = samples.into_iter();
        let mut summary = Self::from_sample(iter.next()?);
        for sample in iter {
            summary.absorb(sample);
        }
        Some(summary)
    }

    /// Folds one more raw sample into the summary.
    ///
    /// The sample must not precede `x_end`.
    #[allow(clippy::cast_precision_loss)] // counts beyond 2^52 are not a practical concern
    pub fn absorb(&mut self, sample: Sample) {
        self.count += 1;
        let n = self.count as f64;
        let delta = sample.y - self.mean;
        self.mean = if delta.is_finite() {
            self.mean + delta / n
        } else {
            // Opposite-signed extremes; the convex form stays finite
            self.mean - self.mean / n + sample.y / n
        };
        self.min = self.min.min(sample.y);
        self.max = self.max.max(sample.y);
        self.x_end = sample.x;
        self.clamp_mean();
    }

    /// Combines another summary into this one.
    ///
    /// Weighted mean by count, min of mins, max of maxes, sum of counts.
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(&mut self, other: &Self) {
        let total = self.count + other.count;
        let weight = other.count as f64 / total as f64;
        let delta = other.mean - self.mean;
        self.mean = if delta.is_finite() {
            self.mean + delta * weight
        } else {
            self.mean * (1.0 - weight) + other.mean * weight
        };
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.x_start = self.x_start.min(other.x_start);
        self.x_end = self.x_end.max(other.x_end);
        self.count = total;
        self.clamp_mean();
    }

    /// Merges two optional summaries.
    pub fn combine(left: Option<Self>, right: Option<Self>) -> Option<Self> {
        match (left, right) {
            (Some(mut l), Some(r)) => {
                l.merge(&r);
                Some(l)
            }
            (l, None) => l,
            (None, r) => r,
        }
    }

    /// Sum of the covered values.
    #[allow(clippy::cast_precision_loss)]
    pub fn sum(&self) -> f64 {
        self.mean * self.count as f64
    }

    /// Running-mean updates can drift a few ulps past the extremes.
    ///
    /// Only rounding drift is absorbed here; the updates above never
    /// overflow for finite inputs.
    fn clamp_mean(&mut self) {
        self.mean = self.mean.clamp(self.min, self.max);
    }
}

/// A summary stored at a pyramid level, tagged with the bucket it occupies.
///
/// Bucket indices are relative to the channel origin in units of the level's
/// bucket width. Entries at one level are ordered by bucket, and each bucket
/// holds at most one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Bucket index at the entry's level.
    pub bucket: i64,
    /// Aggregate of the raw samples inside the bucket.
    pub summary: IntervalSummary,
}

impl SummaryEntry {
    /// Creates an entry for `bucket`.
    pub fn new(bucket: i64, summary: IntervalSummary) -> Self {
        Self { bucket, summary }
    }
}

impl Positioned for SummaryEntry {
    #[inline]
    fn position(&self) -> f64 {
        self.summary.x_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[(f64, f64)]) -> Vec<Sample> {
        values.iter().copied().map(Sample::from).collect()
    }

    #[test]
    fn test_from_samples() {
        let summary =
            IntervalSummary::from_samples(samples(&[(0.0, 0.0), (1.0, 10.0)])).unwrap();
        assert_eq!(summary.x_start, 0.0);
        assert_eq!(summary.x_end, 1.0);
        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 10.0);
        assert_eq!(summary.count, 2);

        assert!(IntervalSummary::from_samples(Vec::new()).is_none());
    }

    #[test]
    fn test_merge_weighted_mean() {
        // Three samples averaging 2 and one sample of 10: mean 4
        let mut left =
            IntervalSummary::from_samples(samples(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]))
                .unwrap();
        let right = IntervalSummary::from_sample(Sample::new(3.0, 10.0));
        left.merge(&right);

        assert_eq!(left.count, 4);
        assert!((left.mean - 4.0).abs() < 1e-12);
        assert_eq!(left.min, 1.0);
        assert_eq!(left.max, 10.0);
        assert_eq!(left.x_start, 0.0);
        assert_eq!(left.x_end, 3.0);
        assert!((left.sum() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_matches_flat_summary() {
        let all = samples(&[(0.0, 3.5), (0.5, -1.0), (1.0, 7.25), (1.5, 0.0), (2.0, 2.0)]);
        let flat = IntervalSummary::from_samples(all.clone()).unwrap();

        let mut split = IntervalSummary::from_samples(all[..2].iter().copied()).unwrap();
        split.merge(&IntervalSummary::from_samples(all[2..].iter().copied()).unwrap());

        assert_eq!(split.count, flat.count);
        assert_eq!(split.min, flat.min);
        assert_eq!(split.max, flat.max);
        assert!((split.mean - flat.mean).abs() < 1e-12);
    }

    #[test]
    fn test_combine_options() {
        let a = IntervalSummary::from_sample(Sample::new(0.0, 1.0));
        let b = IntervalSummary::from_sample(Sample::new(1.0, 3.0));

        assert_eq!(IntervalSummary::combine(None, None), None);
        assert_eq!(IntervalSummary::combine(Some(a), None), Some(a));
        assert_eq!(IntervalSummary::combine(None, Some(b)), Some(b));

        let both = IntervalSummary::combine(Some(a), Some(b)).unwrap();
        assert_eq!(both.count, 2);
        assert_eq!(both.mean, 2.0);
    }

    #[test]
    fn test_mean_of_opposite_extremes() {
        let mut absorbed = IntervalSummary::from_sample(Sample::new(0.0, f64::MAX));
        absorbed.absorb(Sample::new(1.0, -f64::MAX));
        assert_eq!(absorbed.mean, 0.0);
        assert_eq!(absorbed.min, -f64::MAX);
        assert_eq!(absorbed.max, f64::MAX);

        let mut merged = IntervalSummary::from_sample(Sample::new(0.0, -f64::MAX));
        merged.merge(&IntervalSummary::from_sample(Sample::new(1.0, f64::MAX)));
        assert_eq!(merged.mean, 0.0);

        // Uneven weights: one -MAX against three MAX
        let mut heavy = IntervalSummary::from_sample(Sample::new(0.0, -f64::MAX));
        let mut right = IntervalSummary::from_sample(Sample::new(1.0, f64::MAX));
        right.absorb(Sample::new(2.0, f64::MAX));
        right.absorb(Sample::new(3.0, f64::MAX));
        heavy.merge(&right);
        assert!(heavy.mean.is_finite());
        assert!((heavy.mean - f64::MAX / 2.0).abs() <= f64::MAX * 1e-15);
    }

    #[test]
    fn test_mean_stays_within_extremes() {
        let mut summary = IntervalSummary::from_sample(Sample::new(0.0, 0.1));
        for i in 1..1000 {
            summary.absorb(Sample::new(f64::from(i), 0.1));
        }
        assert!(summary.mean >= summary.min && summary.mean <= summary.max);
    }
}
