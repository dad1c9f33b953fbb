//! Cursor-style iterator for point reads with interpolation.
//!
//! A [`ChannelIterator`] borrows a pyramid and resolves positions against its
//! raw level. It is either *valid*, holding a cursor `{index, x}` where
//! `raw[index]` is the sample at or before `x`, or *invalid* after seeking or
//! stepping outside the stored data.
//!
//! Seeks never fail; they leave the iterator valid or invalid. Steps and
//! reads on an invalid iterator fail with [`IteratorError::Invalid`].
//!
//! Samples that share an x position read as one point: a cursor always
//! rests on the last of them, so every seek and step at that x reads the
//! newest value.
//!
//! Iterators always work at raw granularity, so no level is stored.

use crate::config::InterpolationMode;
use crate::error::{IteratorError, Result};
use crate::interpolate::{self, Window};
use crate::pyramid::Pyramid;
use crate::sample::Sample;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cursor {
    index: usize,
    x: f64,
}

/// Positioned reader over a channel's raw samples.
///
/// Created by [`Channel::make_iterator`](crate::channel::Channel::make_iterator),
/// positioned at the oldest sample. The borrow keeps the channel from being
/// mutated while the iterator is alive.
///
/// # Examples
///
/// ```rust
/// use rtgraph::{Channel, InterpolationMode};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut channel = Channel::new("cpu", "s", "%");
/// channel.set_interpolation(InterpolationMode::Linear);
/// channel.add_value(0.0, 10.0)?;
/// channel.add_value(2.0, 20.0)?;
///
/// let mut iter = channel.make_iterator();
/// assert!(iter.seek_at(1.0));
/// assert_eq!(iter.read_value()?, 15.0);
///
/// iter.step_by_samples(1)?;
/// assert_eq!(iter.x(), Some(2.0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelIterator<'a> {
    pyramid: &'a Pyramid,
    mode: InterpolationMode,
    cursor: Option<Cursor>,
}

impl<'a> ChannelIterator<'a> {
    /// Creates an iterator positioned at the oldest sample.
    ///
    /// The iterator starts invalid if the pyramid is empty.
    pub fn new(pyramid: &'a Pyramid, mode: InterpolationMode) -> Self {
        let mut iter = Self {
            pyramid,
            mode,
            cursor: None,
        };
        iter.seek_first();
        iter
    }

    /// Interpolation mode used by [`ChannelIterator::read_value`].
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Changes the interpolation mode of this iterator only.
    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    /// Returns whether the iterator is positioned on stored data.
    pub fn is_valid(&self) -> bool {
        self.cursor.is_some()
    }

    /// Current x position.
    pub fn x(&self) -> Option<f64> {
        self.cursor.map(|c| c.x)
    }

    /// Raw index of the sample at or before the current position.
    pub fn index(&self) -> Option<usize> {
        self.cursor.map(|c| c.index)
    }

    /// The sample at or before the current position.
    pub fn sample(&self) -> Option<Sample> {
        let cursor = self.cursor?;
        self.pyramid.raw().get(cursor.index).copied()
    }

    /// Moves to the oldest sample.
    pub fn seek_first(&mut self) -> bool {
        self.snap(if self.pyramid.is_empty() { None } else { Some(0) })
    }

    /// Moves to the newest sample.
    pub fn seek_last(&mut self) -> bool {
        self.snap(self.pyramid.len().checked_sub(1))
    }

    /// Moves to position `x`.
    ///
    /// Valid when `x` is at or after the oldest sample. Positions past the
    /// newest sample are valid and read as the newest value.
    pub fn seek_at(&mut self, x: f64) -> bool {
        self.cursor = if x.is_nan() {
            None
        } else {
            self.pyramid
                .raw()
                .find_at_or_before(x)
                .map(|index| Cursor { index, x })
        };
        self.is_valid()
    }

    /// Moves to the last sample strictly before `x`.
    pub fn seek_before(&mut self, x: f64) -> bool {
        self.snap(self.pyramid.raw().find_before(x))
    }

    /// Moves to the first sample strictly after `x`.
    pub fn seek_after(&mut self, x: f64) -> bool {
        self.snap(self.pyramid.raw().find_after(x))
    }

    /// Moves to the sample closest to `x`; ties go to the earlier sample.
    pub fn seek_nearest(&mut self, x: f64) -> bool {
        if x.is_nan() {
            self.cursor = None;
            return false;
        }

        let raw = self.pyramid.raw();
        let before = raw.find_at_or_before(x);
        let after = raw.find_at_or_after(x);

        let index = match (before, after) {
            (Some(b), Some(a)) => {
                let before_x = raw.get(b).map_or(f64::NEG_INFINITY, |s| s.x);
                let after_x = raw.get(a).map_or(f64::INFINITY, |s| s.x);
                Some(if x - before_x <= after_x - x { b } else { a })
            }
            (before, after) => before.or(after),
        };
        self.snap(index)
    }

    /// Moves `n` samples forward (or backward when negative) and snaps to
    /// the sample reached.
    ///
    /// Returns whether the iterator is still valid; stepping outside the
    /// stored data invalidates it. A backward step that lands among samples
    /// sharing the current x moves on to the previous position instead.
    ///
    /// # Errors
    ///
    /// Returns [`IteratorError::Invalid`] if the iterator is already invalid.
    pub fn step_by_samples(&mut self, n: isize) -> Result<bool> {
        let cursor = self.cursor.ok_or(IteratorError::Invalid)?;
        let raw = self.pyramid.raw();
        let mut target = cursor
            .index
            .checked_add_signed(n)
            .filter(|&index| index < raw.len());

        if n < 0
            && let (Some(index), Some(current)) = (target, raw.get(cursor.index))
            && raw.get(index).is_some_and(|s| s.x >= current.x)
        {
            target = raw.find_before(current.x);
        }
        Ok(self.snap(target))
    }

    /// Moves by `dx` along x and snaps to a sample.
    ///
    /// Forward steps land on the first sample at or after `x + dx`; backward
    /// steps on the last sample at or before it.
    ///
    /// # Errors
    ///
    /// Returns [`IteratorError::Invalid`] if the iterator is already invalid.
    pub fn step_by_x(&mut self, dx: f64) -> Result<bool> {
        let cursor = self.cursor.ok_or(IteratorError::Invalid)?;
        let target = cursor.x + dx;
        let raw = self.pyramid.raw();

        let index = if target.is_nan() {
            None
        } else if dx >= 0.0 {
            raw.find_at_or_after(target)
        } else {
            raw.find_at_or_before(target)
        };
        Ok(self.snap(index))
    }

    /// Value at the current position under the iterator's interpolation mode.
    ///
    /// # Errors
    ///
    /// Returns [`IteratorError::Invalid`] if the iterator is invalid.
    pub fn read_value(&self) -> Result<f64> {
        let cursor = self.cursor.ok_or(IteratorError::Invalid)?;
        let window = self.window(cursor.index).ok_or(IteratorError::Invalid)?;
        Ok(interpolate::interpolate(self.mode, cursor.x, &window))
    }

    fn window(&self, index: usize) -> Option<Window> {
        let raw = self.pyramid.raw();
        Some(Window {
            prev: index.checked_sub(1).and_then(|i| raw.get(i)).copied(),
            before: *raw.get(index)?,
            after: raw.get(index + 1).copied(),
            next: raw.get(index + 2).copied(),
        })
    }

    /// Moves onto the sample at `index`, resolved to the last sample at its x.
    fn snap(&mut self, index: Option<usize>) -> bool {
        let raw = self.pyramid.raw();
        self.cursor = index
            .and_then(|index| raw.get(index))
            .map(|sample| sample.x)
            .and_then(|x| raw.find_at_or_before(x).map(|index| Cursor { index, x }));
        self.is_valid()
    }
}
