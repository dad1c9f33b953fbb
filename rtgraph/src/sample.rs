//! Raw sample type stored at level 0.

use serde::{Deserialize, Serialize};

use crate::buffer::Positioned;

/// A single raw `(x, y)` sample.
///
/// Samples are immutable once stored. The store does not interpret `x`;
/// callers usually feed a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Position of the sample.
    pub x: f64,
    /// Value of the sample.
    pub y: f64,
}

impl Sample {
    /// Creates a new sample.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Sample {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Sample> for (f64, f64) {
    fn from(sample: Sample) -> Self {
        (sample.x, sample.y)
    }
}

impl Positioned for Sample {
    #[inline]
    fn position(&self) -> f64 {
        self.x
    }
}
