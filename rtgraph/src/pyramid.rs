//! Multi-resolution pyramid over a raw sample buffer.
//!
//! The pyramid keeps every raw sample at level 0 and maintains summary levels
//! above it. Level `k` (k ≥ 1) partitions x into half-open buckets of width
//! `base_width * 2^(k-1)` aligned to the channel origin, with one
//! [`SummaryEntry`] per non-empty bucket.
//!
//! # Write path
//!
//! ```text
//! add_value(x, y)
//!   └─► level 0: append raw sample, evict oldest per capacity
//!   └─► level 1: absorb into open entry, or close it and open a new one
//!         └─► level 2: closed child absorbed by open parent, or parent closes
//!               └─► ... stops at the first level whose open entry absorbs
//! ```
//!
//! Each level only looks at the level directly below it. A raw sample closes
//! at most one entry per level and closures get geometrically rarer going up,
//! so insertion is amortized O(1), like incrementing a binary counter.
//!
//! Bucket indices at level `k` are the level-1 index shifted right by `k - 1`,
//! so buckets nest exactly regardless of floating point rounding.
//!
//! # Eviction
//!
//! Capacity is enforced at level 0 only. Summary entries are corrected
//! lazily: the pyramid remembers the position of the newest evicted sample
//! (the watermark). Buckets at or before the watermark are stale and interval
//! queries recompute that region from the retained raw samples instead.
//! Entries that lie entirely before the watermark are dropped from the front
//! of their level on the next insertion. [`Pyramid::rebuild`] re-derives all
//! levels from level 0 and clears the watermark.

use tracing::{debug, trace, warn};

use crate::buffer::SampleBuffer;
use crate::config::{Capacity, ChannelConfig, DEFAULT_MAX_LEVELS};
use crate::error::{InsertError, QueryError, Result};
use crate::query::{self, IntervalPlan, IntervalQuery, MiddleSpan, SampleRange};
use crate::sample::Sample;
use crate::summary::{IntervalSummary, SummaryEntry};

/// Bucket geometry shared by all levels of a pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    origin: f64,
    base_width: f64,
}

impl Geometry {
    /// Creates a geometry. `base_width` must be positive and finite.
    pub fn new(origin: f64, base_width: f64) -> Self {
        debug_assert!(base_width.is_finite() && base_width > 0.0);
        Self { origin, base_width }
    }

    /// The x origin buckets are aligned to.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Bucket width of level 1.
    pub fn base_width(&self) -> f64 {
        self.base_width
    }

    /// Bucket width of summary level `level` (≥ 1).
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // level ≤ MAX_LEVELS
    pub fn level_width(&self, level: usize) -> f64 {
        self.base_width * 2f64.powi(level.saturating_sub(1) as i32)
    }

    /// Level-1 bucket index of `x`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)] // float-to-int casts saturate
    pub fn base_bucket(&self, x: f64) -> i64 {
        ((x - self.origin) / self.base_width).floor() as i64
    }

    /// Bucket index of `x` at summary level `level` (≥ 1).
    #[inline]
    pub fn bucket(&self, x: f64, level: usize) -> i64 {
        self.base_bucket(x) >> (level.saturating_sub(1))
    }

    /// Start of bucket `bucket` at `level`.
    #[allow(clippy::cast_precision_loss)]
    pub fn bucket_start(&self, bucket: i64, level: usize) -> f64 {
        self.origin + bucket as f64 * self.level_width(level)
    }

    /// Half-open extent `[start, end)` of bucket `bucket` at `level`.
    pub fn bucket_bounds(&self, bucket: i64, level: usize) -> (f64, f64) {
        let start = self.bucket_start(bucket, level);
        (start, start + self.level_width(level))
    }
}

/// One summary level of the pyramid.
///
/// Closed entries are immutable. The open entry is the most recent bucket,
/// which keeps absorbing data until a later bucket appears.
#[derive(Debug, Clone)]
pub struct SummaryLevel {
    level: usize,
    width: f64,
    closed: SampleBuffer<SummaryEntry>,
    open: Option<SummaryEntry>,
}

impl SummaryLevel {
    fn new(level: usize, width: f64) -> Self {
        Self {
            level,
            width,
            closed: SampleBuffer::new(),
            open: None,
        }
    }

    /// Level number (1 = first summary level).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Bucket width of this level.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Closed entries, oldest first.
    pub fn closed(&self) -> &SampleBuffer<SummaryEntry> {
        &self.closed
    }

    /// The open entry, if any.
    pub fn open(&self) -> Option<&SummaryEntry> {
        self.open.as_ref()
    }

    /// Bucket index of the open entry.
    pub fn open_bucket(&self) -> Option<i64> {
        self.open.map(|entry| entry.bucket)
    }

    /// Number of entries, open entry included.
    pub fn len(&self) -> usize {
        self.closed.len() + usize::from(self.open.is_some())
    }

    /// Returns whether the level holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries oldest first, the open entry last.
    pub fn entries(&self) -> impl Iterator<Item = &SummaryEntry> {
        self.closed.iter().chain(self.open.as_ref())
    }

    /// Looks up the entry for `bucket`, closed or open.
    pub fn find_bucket(&self, bucket: i64) -> Option<&SummaryEntry> {
        if let Some(open) = self.open.as_ref().filter(|open| open.bucket == bucket) {
            return Some(open);
        }
        let index = self.closed.partition_point(|e| e.bucket < bucket);
        self.closed.get(index).filter(|e| e.bucket == bucket)
    }

    /// Indices of the closed entries with `first <= bucket <= last`.
    pub fn bucket_index_range(&self, first: i64, last: i64) -> std::ops::Range<usize> {
        let start = self.closed.partition_point(|e| e.bucket < first);
        let end = self.closed.partition_point(|e| e.bucket <= last);
        start..end.max(start)
    }

    /// Folds `summary` into bucket `bucket`.
    ///
    /// Returns the previously open entry when `summary` starts a new bucket;
    /// the caller closes it.
    fn absorb(&mut self, bucket: i64, summary: IntervalSummary) -> Option<SummaryEntry> {
        match self.open.as_mut() {
            Some(open) if open.bucket == bucket => {
                open.summary.merge(&summary);
                None
            }
            _ => self.open.replace(SummaryEntry::new(bucket, summary)),
        }
    }

    fn close(&mut self, entry: SummaryEntry) {
        self.closed.push_back(entry);
    }

    /// Drops closed entries whose last sample precedes `watermark`.
    fn prune_before(&mut self, watermark: f64) -> usize {
        let mut pruned = 0;
        while self
            .closed
            .first()
            .is_some_and(|entry| entry.summary.x_end < watermark)
        {
            self.closed.pop_oldest();
            pruned += 1;
        }
        pruned
    }
}

/// The raw sample level plus its summary levels.
///
/// # Thread Safety
///
/// Not internally synchronized. Writes need `&mut Pyramid`; share it behind a
/// `RwLock` if several readers need it concurrently.
#[derive(Debug, Clone)]
pub struct Pyramid {
    geometry: Geometry,
    capacity: Capacity,
    max_levels: usize,
    raw: SampleBuffer<Sample>,
    /// `levels[i]` is summary level `i + 1`.
    levels: Vec<SummaryLevel>,
    /// Position of the newest evicted raw sample.
    watermark: Option<f64>,
}

impl Pyramid {
    /// Creates an empty pyramid from a channel configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`](crate::error::ConfigError)
    /// if the configuration does not validate.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self::build(
            Geometry::new(config.origin, config.base_width),
            config.capacity()?,
            config.max_levels as usize,
        ))
    }

    fn build(geometry: Geometry, capacity: Capacity, max_levels: usize) -> Self {
        let raw = match capacity.max_samples() {
            Some(max) => SampleBuffer::with_capacity(max.min(1 << 16) + 1),
            None => SampleBuffer::new(),
        };

        Self {
            geometry,
            capacity,
            max_levels,
            raw,
            levels: Vec::new(),
            watermark: None,
        }
    }

    /// Adds a raw sample.
    ///
    /// Updates the open entry of every level the sample reaches, closes and
    /// propagates completed buckets, then enforces the capacity policy.
    ///
    /// # Errors
    ///
    /// - [`InsertError::InvalidSample`] if `x` or `y` is not finite
    /// - [`InsertError::OutOfOrder`] if `x` precedes the newest stored sample
    ///
    /// The pyramid is unchanged on error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rtgraph::config::ChannelConfig;
    /// use rtgraph::pyramid::Pyramid;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut pyramid = Pyramid::new(&ChannelConfig { base_width: 2.0, ..ChannelConfig::default() })?;
    /// for (x, y) in [(0.0, 0.0), (1.0, 10.0), (2.0, 20.0), (3.0, 5.0)] {
    ///     pyramid.add_value(x, y)?;
    /// }
    /// let level1 = pyramid.level(1).unwrap();
    /// assert_eq!(level1.closed().len(), 1);
    /// assert_eq!(level1.open().unwrap().summary.count, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_value(&mut self, x: f64, y: f64) -> Result<()> {
        let sample = validate_sample(x, y)?;

        if let Err(e) = self.raw.append(sample) {
            warn!(x, error = %e, "rejected out-of-order sample");
            return Err(e);
        }

        Self::summarize(&mut self.levels, &self.geometry, self.max_levels, sample);
        self.enforce_capacity();
        self.prune_stale();
        Ok(())
    }

    /// Inserts a sample that may precede the newest stored one.
    ///
    /// In-order samples take the normal path. Out-of-order samples are placed
    /// at their sorted position in level 0 and all summary levels are rebuilt,
    /// which costs O(n).
    ///
    /// # Errors
    ///
    /// Returns [`InsertError::InvalidSample`] if `x` or `y` is not finite.
    pub fn insert_out_of_order(&mut self, x: f64, y: f64) -> Result<()> {
        let sample = validate_sample(x, y)?;

        if self.raw.last().is_none_or(|last| last.x <= x) {
            return self.add_value(x, y);
        }

        let index = self.raw.insert_sorted(sample);
        debug!(x, index, "inserted out-of-order sample, rebuilding summaries");
        self.enforce_capacity();
        self.rebuild();
        Ok(())
    }

    /// Re-derives every summary level by replaying level 0.
    ///
    /// Clears the eviction watermark: afterwards every summary entry is an
    /// exact aggregate of the retained raw samples.
    pub fn rebuild(&mut self) {
        self.levels.clear();
        self.watermark = None;

        for &sample in &self.raw {
            Self::summarize(&mut self.levels, &self.geometry, self.max_levels, sample);
        }

        debug!(
            samples = self.raw.len(),
            levels = self.levels.len(),
            "rebuilt summary levels"
        );
    }

    /// Replaces the capacity policy and enforces it immediately.
    pub fn set_capacity(&mut self, capacity: Capacity) {
        self.capacity = capacity;
        self.enforce_capacity();
        self.prune_stale();
    }

    /// Removes all samples and summary levels.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.levels.clear();
        self.watermark = None;
    }

    /// Aggregates the raw samples with `x_lo <= x <= x_hi`.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidRange`] if `x_lo > x_hi` or either bound is NaN
    /// - [`QueryError::EmptyChannel`] if the pyramid holds no samples
    /// - [`QueryError::NoData`] if no sample lies inside the interval
    pub fn query_interval(&self, x_lo: f64, x_hi: f64) -> Result<IntervalSummary> {
        self.query_interval_detailed(x_lo, x_hi)
            .map(|query| query.summary)
    }

    /// Like [`Pyramid::query_interval`], also reporting how the query was answered.
    ///
    /// # Errors
    ///
    /// Same as [`Pyramid::query_interval`].
    pub fn query_interval_detailed(&self, x_lo: f64, x_hi: f64) -> Result<IntervalQuery> {
        validate_range(x_lo, x_hi)?;
        if self.raw.is_empty() {
            return Err(QueryError::EmptyChannel.into());
        }

        let plan = self.plan_interval(x_lo, x_hi);
        let lo_index = self.raw.partition_point(|s| s.x < x_lo);
        let hi_index = self.raw.partition_point(|s| s.x <= x_hi).max(lo_index);

        let (summary, buckets_merged, raw_samples_scanned) = match &plan.middle {
            Some(middle) => {
                let level = plan.level;
                let geometry = self.geometry;

                let middle_summary = self.levels[level - 1]
                    .closed
                    .range(middle.entries.clone())
                    .fold(None, |acc, entry| {
                        IntervalSummary::combine(acc, Some(entry.summary))
                    });

                let left_end = self
                    .raw
                    .partition_point(|s| geometry.bucket(s.x, level) < middle.first_bucket)
                    .clamp(lo_index, hi_index);
                let right_start = self
                    .raw
                    .partition_point(|s| geometry.bucket(s.x, level) <= middle.last_bucket)
                    .clamp(left_end, hi_index);

                let left = self.summarize_raw(lo_index..left_end);
                let right = self.summarize_raw(right_start..hi_index);
                let summary =
                    IntervalSummary::combine(IntervalSummary::combine(left, middle_summary), right);

                (
                    summary,
                    middle.entries.len(),
                    (left_end - lo_index) + (hi_index - right_start),
                )
            }
            None => (
                self.summarize_raw(lo_index..hi_index),
                0,
                hi_index - lo_index,
            ),
        };

        let summary = summary.ok_or(QueryError::NoData { x_lo, x_hi })?;

        Ok(IntervalQuery {
            summary,
            level_used: plan.level,
            buckets_merged,
            raw_samples_scanned,
        })
    }

    /// Decides which level answers `[x_lo, x_hi]` and which of its buckets to merge.
    ///
    /// Tries the coarsest fitting level first and falls back to finer levels
    /// while no usable bucket fits. A bucket is usable when it is closed, not
    /// stale, and its samples all lie inside the interval.
    pub fn plan_interval(&self, x_lo: f64, x_hi: f64) -> IntervalPlan {
        let top = query::select_level(
            x_hi - x_lo,
            self.geometry.base_width(),
            self.levels.len(),
        );

        for level in (1..=top).rev() {
            let summary_level = &self.levels[level - 1];

            let Some((mut first, mut last)) =
                query::full_bucket_span(x_lo, x_hi, &self.geometry, level)
            else {
                continue;
            };

            if let Some(watermark) = self.watermark {
                first = first.max(self.geometry.bucket(watermark, level).saturating_add(1));
            }
            if let Some(open_bucket) = summary_level.open_bucket() {
                last = last.min(open_bucket.saturating_sub(1));
            }
            if first > last {
                continue;
            }

            let mut entries = summary_level.bucket_index_range(first, last);

            // Rounding at the interval ends can put a sample just outside it.
            while let Some(entry) = summary_level.closed.get(entries.start)
                && entries.start < entries.end
                && entry.summary.x_start < x_lo
            {
                first = entry.bucket + 1;
                entries.start += 1;
            }
            while entries.start < entries.end
                && let Some(entry) = summary_level.closed.get(entries.end - 1)
                && entry.summary.x_end > x_hi
            {
                last = entry.bucket - 1;
                entries.end -= 1;
            }

            if entries.is_empty() {
                continue;
            }

            return IntervalPlan {
                level,
                middle: Some(MiddleSpan {
                    first_bucket: first,
                    last_bucket: last,
                    entries,
                }),
            };
        }

        IntervalPlan::raw_only()
    }

    /// Iterates over the raw samples with `x_lo <= x <= x_hi`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] if `x_lo > x_hi` or either bound is NaN.
    pub fn samples(&self, x_lo: f64, x_hi: f64) -> Result<SampleRange<'_>> {
        validate_range(x_lo, x_hi)?;
        let indices = self.raw.index_range(x_lo, x_hi, true);
        Ok(SampleRange::new(self.raw.range(indices)))
    }

    /// Bucket geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Current capacity policy.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Maximum number of summary levels.
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// The raw level.
    pub fn raw(&self) -> &SampleBuffer<Sample> {
        &self.raw
    }

    /// All summary levels, level 1 first.
    pub fn levels(&self) -> &[SummaryLevel] {
        &self.levels
    }

    /// Summary level `level` (1-based), if it has been created.
    pub fn level(&self, level: usize) -> Option<&SummaryLevel> {
        level.checked_sub(1).and_then(|index| self.levels.get(index))
    }

    /// Number of summary levels created so far.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of raw samples.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns whether no raw samples are stored.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Positions of the oldest and newest raw samples.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        Some((self.raw.first()?.x, self.raw.last()?.x))
    }

    /// Position of the newest evicted sample since the last rebuild.
    pub fn watermark(&self) -> Option<f64> {
        self.watermark
    }

    /// Returns whether bucket `bucket` at `level` may include evicted samples.
    pub fn is_stale(&self, level: usize, bucket: i64) -> bool {
        self.watermark
            .is_some_and(|watermark| bucket <= self.geometry.bucket(watermark, level))
    }

    /// Feeds one raw sample through the summary levels.
    fn summarize(
        levels: &mut Vec<SummaryLevel>,
        geometry: &Geometry,
        max_levels: usize,
        sample: Sample,
    ) {
        let mut bucket = geometry.base_bucket(sample.x);
        let mut summary = IntervalSummary::from_sample(sample);
        let mut index = 0;

        loop {
            if index == levels.len() {
                if index >= max_levels {
                    break;
                }
                let level = index + 1;
                levels.push(SummaryLevel::new(level, geometry.level_width(level)));
                debug!(level, width = geometry.level_width(level), "created summary level");
            }

            let Some(closed) = levels[index].absorb(bucket, summary) else {
                break;
            };
            levels[index].close(closed);

            bucket = closed.bucket >> 1;
            summary = closed.summary;
            index += 1;
        }
    }

    fn summarize_raw(&self, indices: std::ops::Range<usize>) -> Option<IntervalSummary> {
        IntervalSummary::from_samples(self.raw.range(indices).copied())
    }

    fn enforce_capacity(&mut self) {
        let mut evicted = 0usize;

        if let Some(max) = self.capacity.max_samples() {
            while self.raw.len() > max {
                self.evict_one();
                evicted += 1;
            }
        }

        if let Some(max_range) = self.capacity.max_x_range() {
            while let Some((oldest, newest)) = self.x_range()
                && newest - oldest > max_range
            {
                self.evict_one();
                evicted += 1;
            }
        }

        if evicted > 0 {
            trace!(evicted, watermark = ?self.watermark, "evicted raw samples");
        }
    }

    fn evict_one(&mut self) {
        if let Some(sample) = self.raw.pop_oldest() {
            self.watermark = Some(sample.x);
        }
    }

    fn prune_stale(&mut self) {
        let Some(watermark) = self.watermark else {
            return;
        };

        let pruned: usize = self
            .levels
            .iter_mut()
            .map(|level| level.prune_before(watermark))
            .sum();

        if pruned > 0 {
            trace!(pruned, watermark, "pruned evicted summary entries");
        }
    }
}

impl Default for Pyramid {
    /// Unit base width at origin 0, unbounded capacity.
    fn default() -> Self {
        Self::build(
            Geometry::new(0.0, 1.0),
            Capacity::UNBOUNDED,
            DEFAULT_MAX_LEVELS as usize,
        )
    }
}

fn validate_sample(x: f64, y: f64) -> Result<Sample> {
    if !x.is_finite() {
        return Err(InsertError::InvalidSample {
            x,
            y,
            reason: "x must be finite".to_string(),
        }
        .into());
    }
    if !y.is_finite() {
        return Err(InsertError::InvalidSample {
            x,
            y,
            reason: "y must be finite".to_string(),
        }
        .into());
    }
    Ok(Sample::new(x, y))
}

fn validate_range(x_lo: f64, x_hi: f64) -> Result<()> {
    if x_lo.is_nan() || x_hi.is_nan() || x_lo > x_hi {
        return Err(QueryError::InvalidRange { x_lo, x_hi }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RtgError;

    fn pyramid(base_width: f64) -> Pyramid {
        Pyramid::new(&ChannelConfig {
            base_width,
            ..ChannelConfig::default()
        })
        .unwrap()
    }

    fn filled(base_width: f64, n: u32) -> Pyramid {
        let mut p = pyramid(base_width);
        for i in 0..n {
            p.add_value(f64::from(i), f64::from(i % 7)).unwrap();
        }
        p
    }

    fn brute_force(p: &Pyramid, x_lo: f64, x_hi: f64) -> Option<IntervalSummary> {
        IntervalSummary::from_samples(p.raw().iter().copied().filter(|s| s.x >= x_lo && s.x <= x_hi))
    }

    fn assert_close(a: &IntervalSummary, b: &IntervalSummary) {
        assert_eq!(a.count, b.count);
        assert_eq!(a.min, b.min);
        assert_eq!(a.max, b.max);
        assert_eq!(a.x_start, b.x_start);
        assert_eq!(a.x_end, b.x_end);
        assert!((a.mean - b.mean).abs() < 1e-9, "{} vs {}", a.mean, b.mean);
    }

    #[test]
    fn test_geometry_buckets() {
        let geometry = Geometry::new(0.0, 2.0);

        assert_eq!(geometry.base_bucket(0.0), 0);
        assert_eq!(geometry.base_bucket(1.99), 0);
        assert_eq!(geometry.base_bucket(2.0), 1);
        assert_eq!(geometry.base_bucket(-0.5), -1);

        assert_eq!(geometry.level_width(1), 2.0);
        assert_eq!(geometry.level_width(3), 8.0);
        assert_eq!(geometry.bucket(7.0, 3), 0);
        assert_eq!(geometry.bucket(8.0, 3), 1);
        assert_eq!(geometry.bucket(-0.5, 3), -1);
        assert_eq!(geometry.bucket_bounds(1, 2), (4.0, 8.0));
    }

    #[test]
    fn test_empty_pyramid() {
        let p = pyramid(1.0);

        assert!(p.is_empty());
        assert_eq!(p.level_count(), 0);
        assert!(p.level(1).is_none());
        assert!(matches!(
            p.query_interval(0.0, 1.0),
            Err(RtgError::Query(QueryError::EmptyChannel))
        ));
    }

    #[test]
    fn test_first_sample_opens_level_one() {
        let mut p = pyramid(1.0);
        p.add_value(0.5, 3.0).unwrap();

        assert_eq!(p.level_count(), 1);
        let level1 = p.level(1).unwrap();
        assert!(level1.closed().is_empty());
        assert_eq!(level1.open_bucket(), Some(0));
    }

    #[test]
    fn test_levels_grow_lazily() {
        let mut p = pyramid(1.0);
        p.add_value(0.0, 1.0).unwrap();
        p.add_value(0.5, 1.0).unwrap();
        assert_eq!(p.level_count(), 1);

        // Second level-1 bucket closes the first and creates level 2
        p.add_value(1.0, 1.0).unwrap();
        assert_eq!(p.level_count(), 2);
        assert_eq!(p.level(1).unwrap().closed().len(), 1);
        assert_eq!(p.level(2).unwrap().open_bucket(), Some(0));

        // Level 3 appears once level 2 closes its first bucket [0, 2)
        p.add_value(2.0, 1.0).unwrap();
        assert_eq!(p.level_count(), 2);
        p.add_value(3.0, 1.0).unwrap();
        assert_eq!(p.level_count(), 3);
        assert_eq!(p.level(2).unwrap().closed().len(), 1);
        assert_eq!(p.level(3).unwrap().open().unwrap().summary.count, 2);
    }

    #[test]
    fn test_level_count_capped() {
        let mut p = Pyramid::new(&ChannelConfig {
            max_levels: 2,
            ..ChannelConfig::default()
        })
        .unwrap();
        for i in 0..64 {
            p.add_value(f64::from(i), 0.0).unwrap();
        }
        assert_eq!(p.level_count(), 2);
        // The top level keeps every closed bucket it received
        let top = p.level(2).unwrap();
        assert_eq!(top.len(), 32);
    }

    #[test]
    fn test_sparse_buckets_are_skipped() {
        let mut p = pyramid(1.0);
        p.add_value(0.0, 1.0).unwrap();
        p.add_value(10.0, 2.0).unwrap();
        p.add_value(10.5, 4.0).unwrap();

        let level1 = p.level(1).unwrap();
        assert_eq!(level1.closed().len(), 1);
        assert_eq!(level1.closed().get(0).unwrap().bucket, 0);
        assert_eq!(level1.open_bucket(), Some(10));
        assert!(level1.find_bucket(5).is_none());
        assert_eq!(level1.find_bucket(10).unwrap().summary.mean, 3.0);
    }

    #[test]
    fn test_rejects_out_of_order() {
        let mut p = pyramid(1.0);
        p.add_value(5.0, 1.0).unwrap();

        let err = p.add_value(4.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            RtgError::Insert(InsertError::OutOfOrder { .. })
        ));
        assert_eq!(p.len(), 1);
        assert_eq!(p.level(1).unwrap().open().unwrap().summary.count, 1);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut p = pyramid(1.0);
        assert!(p.add_value(f64::NAN, 1.0).is_err());
        assert!(p.add_value(1.0, f64::INFINITY).is_err());
        assert!(p.is_empty());
    }

    #[test]
    fn test_equal_x_accepted() {
        let mut p = pyramid(1.0);
        p.add_value(1.0, 1.0).unwrap();
        p.add_value(1.0, 3.0).unwrap();

        let summary = p.query_interval(1.0, 1.0).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 2.0);
    }

    #[test]
    fn test_query_uses_coarse_level() {
        let p = filled(1.0, 1000);

        let query = p.query_interval_detailed(100.0, 900.0).unwrap();
        assert!(query.level_used >= 5);
        assert!(query.buckets_merged > 0);
        assert!(query.raw_samples_scanned < 2 * 256);
        assert_close(&query.summary, &brute_force(&p, 100.0, 900.0).unwrap());
    }

    #[test]
    fn test_query_matches_brute_force() {
        let p = filled(0.75, 300);

        for (lo, hi) in [
            (0.0, 299.0),
            (3.3, 3.3),
            (3.0, 3.0),
            (10.1, 57.9),
            (-100.0, 12.0),
            (250.5, 1000.0),
            (f64::NEG_INFINITY, f64::INFINITY),
        ] {
            let expected = brute_force(&p, lo, hi);
            match expected {
                Some(expected) => assert_close(&p.query_interval(lo, hi).unwrap(), &expected),
                None => assert!(p.query_interval(lo, hi).is_err()),
            }
        }
    }

    #[test]
    fn test_query_no_data_in_range() {
        let mut p = pyramid(1.0);
        p.add_value(0.0, 1.0).unwrap();
        p.add_value(10.0, 1.0).unwrap();

        assert!(matches!(
            p.query_interval(2.0, 8.0),
            Err(RtgError::Query(QueryError::NoData { .. }))
        ));
    }

    #[test]
    fn test_query_invalid_range() {
        let p = filled(1.0, 10);

        assert!(matches!(
            p.query_interval(5.0, 1.0),
            Err(RtgError::Query(QueryError::InvalidRange { .. }))
        ));
        assert!(p.query_interval(f64::NAN, 1.0).is_err());
        assert!(p.samples(2.0, 1.0).is_err());
    }

    #[test]
    fn test_open_buckets_not_merged() {
        // All data sits in level 2's open bucket; the plan must not rely on it
        let p = filled(1.0, 3);

        let plan = p.plan_interval(0.0, 3.0);
        if let Some(middle) = &plan.middle {
            let level = p.level(plan.level).unwrap();
            assert!(middle.last_bucket < level.open_bucket().unwrap());
        }
        assert_eq!(p.query_interval(0.0, 3.0).unwrap().count, 3);
    }

    #[test]
    fn test_eviction_max_samples() {
        let mut p = pyramid(1.0);
        p.set_capacity(Capacity::new(5, 0.0).unwrap());
        for i in 0..20 {
            p.add_value(f64::from(i), f64::from(i)).unwrap();
            assert!(p.len() <= 5);
        }

        assert_eq!(p.x_range(), Some((15.0, 19.0)));
        assert_eq!(p.watermark(), Some(14.0));

        let summary = p.query_interval(0.0, 100.0).unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, 15.0);
        assert_eq!(summary.mean, 17.0);
    }

    #[test]
    fn test_eviction_max_x_range() {
        let mut p = pyramid(1.0);
        p.set_capacity(Capacity::new(0, 3.0).unwrap());
        for i in 0..10 {
            p.add_value(f64::from(i), 1.0).unwrap();
        }

        assert_eq!(p.x_range(), Some((6.0, 9.0)));
    }

    #[test]
    fn test_stale_buckets_bypassed() {
        let mut p = pyramid(4.0);
        for i in 0..12 {
            p.add_value(f64::from(i), 1.0).unwrap();
        }
        // Evict x = 0..=5: bucket [4, 8) is now partially evicted
        p.set_capacity(Capacity::new(6, 0.0).unwrap());

        assert!(p.is_stale(1, 1));
        assert!(!p.is_stale(1, 2));

        let query = p.query_interval_detailed(0.0, 12.0).unwrap();
        assert_eq!(query.summary.count, 6);
        assert_eq!(query.summary.x_start, 6.0);

        // Fully evicted bucket [0, 4) was pruned from level 1
        assert!(p.level(1).unwrap().find_bucket(0).is_none());
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut p = filled(0.5, 500);
        let before: Vec<Vec<SummaryEntry>> = p
            .levels()
            .iter()
            .map(|level| level.entries().copied().collect())
            .collect();

        p.rebuild();
        let after: Vec<Vec<SummaryEntry>> = p
            .levels()
            .iter()
            .map(|level| level.entries().copied().collect())
            .collect();

        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.len(), b.len());
            for (ea, eb) in a.iter().zip(b) {
                assert_eq!(ea.bucket, eb.bucket);
                assert_close(&ea.summary, &eb.summary);
            }
        }
    }

    #[test]
    fn test_rebuild_clears_watermark() {
        let mut p = pyramid(1.0);
        p.set_capacity(Capacity::new(3, 0.0).unwrap());
        for i in 0..10 {
            p.add_value(f64::from(i) * 0.4, 1.0).unwrap();
        }
        assert!(p.watermark().is_some());

        p.rebuild();
        assert_eq!(p.watermark(), None);
        let total: u64 = p.level(1).unwrap().entries().map(|e| e.summary.count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_insert_out_of_order() {
        let mut p = pyramid(1.0);
        for x in [0.0, 1.0, 3.0, 4.0] {
            p.add_value(x, x).unwrap();
        }

        p.insert_out_of_order(2.0, 2.0).unwrap();

        let xs: Vec<f64> = p.raw().iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(p.level(1).unwrap().find_bucket(2).is_some());
        assert_eq!(p.query_interval(0.0, 4.0).unwrap().mean, 2.0);

        // In-order values take the normal path
        p.insert_out_of_order(5.0, 5.0).unwrap();
        assert_eq!(p.len(), 6);
    }

    #[test]
    fn test_samples_range() {
        let p = filled(1.0, 10);

        let xs: Vec<f64> = p.samples(2.5, 6.0).unwrap().map(|s| s.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(p.samples(20.0, 30.0).unwrap().count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut p = filled(1.0, 10);
        p.clear();

        assert!(p.is_empty());
        assert_eq!(p.level_count(), 0);
        p.add_value(0.0, 1.0).unwrap();
        assert_eq!(p.len(), 1);
    }
}
