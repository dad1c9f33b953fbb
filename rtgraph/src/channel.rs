//! The [`Channel`] facade: one named stream of samples and its pyramid.
//!
//! A channel owns exactly one [`Pyramid`] and adds metadata (name and units)
//! plus argument validation on top of it. All reads and writes go through
//! here.
//!
//! # Concurrency
//!
//! A channel is not internally synchronized. Writers need `&mut Channel`;
//! iterators and queries borrow `&Channel`. To serve several reader threads,
//! wrap the channel in a `std::sync::RwLock`:
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//! use rtgraph::Channel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Arc::new(RwLock::new(Channel::new("temp", "s", "°C")));
//! channel.write().unwrap().add_value(0.0, 21.5)?;
//!
//! let reader = Arc::clone(&channel);
//! let mean = std::thread::spawn(move || {
//!     let guard = reader.read().unwrap();
//!     guard.query_interval(0.0, 10.0).map(|s| s.mean)
//! })
//! .join()
//! .unwrap()?;
//! assert_eq!(mean, 21.5);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::config::{Capacity, ChannelConfig, InterpolationMode};
use crate::error::Result;
use crate::iter::ChannelIterator;
use crate::pyramid::Pyramid;
use crate::query::{IntervalQuery, SampleRange};
use crate::summary::IntervalSummary;

/// A named, live stream of `(x, y)` samples.
///
/// # Examples
///
/// ```rust
/// use rtgraph::Channel;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut channel = Channel::new("cpu.usage", "s", "%");
/// channel.set_max_samples(3_600)?;
///
/// for t in 0..100 {
///     channel.add_value(f64::from(t), f64::from(t % 10))?;
/// }
///
/// let summary = channel.query_interval(0.0, 99.0)?;
/// assert_eq!(summary.count, 100);
/// assert_eq!(summary.max, 9.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    x_units: String,
    y_units: String,
    config: ChannelConfig,
    pyramid: Pyramid,
}

impl Channel {
    /// Creates an empty channel with the default configuration.
    pub fn new(name: impl Into<String>, x_units: impl Into<String>, y_units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x_units: x_units.into(),
            y_units: y_units.into(),
            config: ChannelConfig::default(),
            pyramid: Pyramid::default(),
        }
    }

    /// Creates an empty channel with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`](crate::error::ConfigError)
    /// if the configuration does not validate.
    pub fn with_config(
        name: impl Into<String>,
        x_units: impl Into<String>,
        y_units: impl Into<String>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let pyramid = Pyramid::new(&config)?;
        let name = name.into();
        debug!(channel = %name, base_width = config.base_width, "created channel");

        Ok(Self {
            name,
            x_units: x_units.into(),
            y_units: y_units.into(),
            config,
            pyramid,
        })
    }

    /// Bounds the number of raw samples (0 = unbounded).
    ///
    /// Takes effect immediately: excess samples are evicted oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`](crate::error::ConfigError)
    /// if `max_samples` does not fit in `usize`.
    pub fn set_max_samples(&mut self, max_samples: u64) -> Result<()> {
        let validated = Capacity::new(max_samples, 0.0)?;
        let max = validated.max_samples().unwrap_or(0);

        self.config.max_samples = max_samples;
        self.pyramid
            .set_capacity(self.pyramid.capacity().with_max_samples(max));
        Ok(())
    }

    /// Bounds the x distance between the oldest and newest raw sample
    /// (0 = unbounded).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`](crate::error::ConfigError)
    /// if `max_x_range` is negative or not finite.
    pub fn set_max_x_range(&mut self, max_x_range: f64) -> Result<()> {
        Capacity::new(0, max_x_range)?;

        self.config.max_x_range = max_x_range;
        self.pyramid
            .set_capacity(self.pyramid.capacity().with_max_x_range(max_x_range));
        Ok(())
    }

    /// Sets the interpolation mode for iterators created afterwards.
    pub fn set_interpolation(&mut self, mode: InterpolationMode) {
        self.config.interpolation = mode;
    }

    /// Appends a sample.
    ///
    /// # Errors
    ///
    /// - [`InsertError::OutOfOrder`](crate::error::InsertError) if `x`
    ///   precedes the newest stored sample
    /// - [`InsertError::InvalidSample`](crate::error::InsertError) if `x` or
    ///   `y` is not finite
    #[inline]
    pub fn add_value(&mut self, x: f64, y: f64) -> Result<()> {
        self.pyramid.add_value(x, y)
    }

    /// Inserts a sample that may be out of order, rebuilding summaries if it is.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError::InvalidSample`](crate::error::InsertError) if
    /// `x` or `y` is not finite.
    pub fn insert_out_of_order(&mut self, x: f64, y: f64) -> Result<()> {
        self.pyramid.insert_out_of_order(x, y)
    }

    /// Mean, min, max and count of the samples with `x_lo <= x <= x_hi`.
    ///
    /// # Errors
    ///
    /// - [`QueryError::InvalidRange`](crate::error::QueryError) if
    ///   `x_lo > x_hi` or either bound is NaN
    /// - [`QueryError::EmptyChannel`](crate::error::QueryError) if the
    ///   channel holds no samples
    /// - [`QueryError::NoData`](crate::error::QueryError) if no sample lies
    ///   inside the interval
    pub fn query_interval(&self, x_lo: f64, x_hi: f64) -> Result<IntervalSummary> {
        self.pyramid.query_interval(x_lo, x_hi)
    }

    /// Like [`Channel::query_interval`], also reporting which level answered.
    ///
    /// # Errors
    ///
    /// Same as [`Channel::query_interval`].
    pub fn query_interval_detailed(&self, x_lo: f64, x_hi: f64) -> Result<IntervalQuery> {
        self.pyramid.query_interval_detailed(x_lo, x_hi)
    }

    /// Creates an iterator positioned at the oldest sample, using the
    /// channel's interpolation mode.
    pub fn make_iterator(&self) -> ChannelIterator<'_> {
        ChannelIterator::new(&self.pyramid, self.config.interpolation)
    }

    /// Raw samples with `x_lo <= x <= x_hi`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`](crate::error::QueryError) if
    /// `x_lo > x_hi` or either bound is NaN.
    pub fn samples(&self, x_lo: f64, x_hi: f64) -> Result<SampleRange<'_>> {
        self.pyramid.samples(x_lo, x_hi)
    }

    /// Removes all samples. Configuration and metadata are kept.
    pub fn clear(&mut self) {
        self.pyramid.clear();
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units of x.
    pub fn x_units(&self) -> &str {
        &self.x_units
    }

    /// Units of y.
    pub fn y_units(&self) -> &str {
        &self.y_units
    }

    /// Current configuration, including setter changes.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Interpolation mode for new iterators.
    pub fn interpolation(&self) -> InterpolationMode {
        self.config.interpolation
    }

    /// Number of raw samples stored.
    pub fn len(&self) -> usize {
        self.pyramid.len()
    }

    /// Returns whether the channel holds no samples.
    pub fn is_empty(&self) -> bool {
        self.pyramid.is_empty()
    }

    /// Positions of the oldest and newest stored samples.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        self.pyramid.x_range()
    }

    /// The underlying pyramid, for inspection.
    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }
}
