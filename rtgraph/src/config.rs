//! Channel configuration types for rtgraph.
//!
//! These types define the pyramid geometry (bucket width and origin), the
//! capacity policy of the raw level, and the interpolation mode used by
//! iterators. A configuration can be built in code or loaded from a JSON file.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Hard upper bound on the number of summary levels.
///
/// Level `k` buckets are addressed by shifting the level-1 bucket index right
/// by `k - 1`, so the shift must stay below the width of an `i64`.
pub const MAX_LEVELS: u32 = 62;

/// Default number of summary levels a pyramid may grow to.
pub const DEFAULT_MAX_LEVELS: u32 = 32;

/// Configuration for a single channel.
///
/// # Example
///
/// ```rust
/// use rtgraph::config::{ChannelConfig, InterpolationMode};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ChannelConfig {
///     base_width: 0.5,
///     max_samples: 10_000,
///     interpolation: InterpolationMode::Smooth,
///     ..ChannelConfig::default()
/// };
/// config.validate()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Bucket width of summary level 1.
    ///
    /// Level `k` uses `base_width * 2^(k-1)`.
    pub base_width: f64,

    /// Global x origin all buckets are aligned to.
    pub origin: f64,

    /// Maximum number of raw samples kept (0 = unbounded).
    pub max_samples: u64,

    /// Maximum x distance between the oldest and newest raw sample (0 = unbounded).
    pub max_x_range: f64,

    /// Interpolation mode used by iterators created from the channel.
    pub interpolation: InterpolationMode,

    /// Maximum number of summary levels the pyramid may create.
    pub max_levels: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_width: 1.0,
            origin: 0.0,
            max_samples: 0,
            max_x_range: 0.0,
            interpolation: InterpolationMode::Linear,
            max_levels: DEFAULT_MAX_LEVELS,
        }
    }
}

impl ChannelConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if:
    /// - `base_width` is not a positive finite number
    /// - `origin` is not finite
    /// - `max_x_range` is negative or not finite
    /// - `max_samples` does not fit in `usize`
    /// - `max_levels` is outside `1..=MAX_LEVELS`
    pub fn validate(&self) -> Result<()> {
        if !self.base_width.is_finite() || self.base_width <= 0.0 {
            return Err(invalid(format!(
                "base_width must be a positive finite number, got {}",
                self.base_width
            )));
        }

        if !self.origin.is_finite() {
            return Err(invalid(format!("origin must be finite, got {}", self.origin)));
        }

        self.capacity()?;

        if self.max_levels == 0 || self.max_levels > MAX_LEVELS {
            return Err(invalid(format!(
                "max_levels must be in 1..={MAX_LEVELS}, got {}",
                self.max_levels
            )));
        }

        Ok(())
    }

    /// Returns the validated capacity policy described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if either bound is invalid.
    pub fn capacity(&self) -> Result<Capacity> {
        Capacity::new(self.max_samples, self.max_x_range)
    }

    /// Loads a configuration from a JSON file and validates it.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this type, or
    /// [`ConfigError::InvalidConfiguration`] if validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: ChannelConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Capacity policy enforced on the raw level.
///
/// A zero bound means unbounded. Both bounds may be active at once; the
/// oldest samples are evicted until both hold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Capacity {
    max_samples: usize,
    max_x_range: f64,
}

impl Capacity {
    /// An unbounded capacity policy.
    pub const UNBOUNDED: Self = Self {
        max_samples: 0,
        max_x_range: 0.0,
    };

    /// Creates a validated capacity policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `max_samples` does not
    /// fit in `usize` or `max_x_range` is negative or not finite.
    pub fn new(max_samples: u64, max_x_range: f64) -> Result<Self> {
        let max_samples = usize::try_from(max_samples).map_err(|_| {
            invalid(format!(
                "max_samples {max_samples} exceeds the addressable size of this platform"
            ))
        })?;

        if !max_x_range.is_finite() || max_x_range < 0.0 {
            return Err(invalid(format!(
                "max_x_range must be a finite non-negative number, got {max_x_range}"
            )));
        }

        Ok(Self {
            max_samples,
            max_x_range,
        })
    }

    /// Maximum number of raw samples, `None` if unbounded.
    pub fn max_samples(&self) -> Option<usize> {
        (self.max_samples > 0).then_some(self.max_samples)
    }

    /// Maximum raw x range, `None` if unbounded.
    pub fn max_x_range(&self) -> Option<f64> {
        (self.max_x_range > 0.0).then_some(self.max_x_range)
    }

    /// Returns a copy with a different sample bound.
    pub(crate) fn with_max_samples(self, max_samples: usize) -> Self {
        Self {
            max_samples,
            ..self
        }
    }

    /// Returns a copy with a different x-range bound.
    pub(crate) fn with_max_x_range(self, max_x_range: f64) -> Self {
        Self {
            max_x_range,
            ..self
        }
    }
}

/// How an iterator turns the samples around its position into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Value of the sample at or before the position.
    Previous,

    /// Value of the closer bracketing sample; ties go to the earlier one.
    Nearest,

    /// Straight line between the bracketing samples.
    #[default]
    Linear,

    /// Cubic through the bracketing samples using one extra neighbour on
    /// each side. Falls back to linear at the ends of the buffer.
    Smooth,
}

impl InterpolationMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 4] = [Self::Previous, Self::Nearest, Self::Linear, Self::Smooth];

    /// Lowercase name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Previous => "previous",
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Smooth => "smooth",
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InterpolationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownInterpolation {
                name: s.to_string(),
            })
    }
}

fn invalid(reason: String) -> crate::error::RtgError {
    ConfigError::InvalidConfiguration { reason }.into()
}
