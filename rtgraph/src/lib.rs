//! # rtgraph
//!
//! Multi-resolution in-memory store for live `(x, y)` sample channels.
//!
//! rtgraph keeps one ever-growing stream of samples (typically x = time) and
//! answers two kinds of reads quickly: aggregates over an arbitrary
//! x-interval, and point lookups with interpolation. Memory stays bounded
//! through a capacity policy on the raw samples.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Amortized O(1) insertion, like incrementing a binary counter
//! - Interval queries merge whole summary buckets and only walk raw samples at the edges
//! - Four interpolation modes: previous, nearest, linear, smooth (Catmull-Rom)
//! - Bounded memory by sample count and/or x range, evicting oldest first
//! - No background threads, no global state, no I/O on the data path
//!
//! ## Quick Start
//!
//! ```rust
//! use rtgraph::{Channel, ChannelConfig, InterpolationMode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChannelConfig {
//!     base_width: 2.0,
//!     max_samples: 10_000,
//!     interpolation: InterpolationMode::Linear,
//!     ..ChannelConfig::default()
//! };
//! let mut channel = Channel::with_config("sensor", "s", "V", config)?;
//!
//! for (x, y) in [(0.0, 0.0), (1.0, 10.0), (2.0, 20.0), (3.0, 5.0)] {
//!     channel.add_value(x, y)?;
//! }
//!
//! // Aggregate over an interval
//! let summary = channel.query_interval(0.0, 3.0)?;
//! assert_eq!(summary.count, 4);
//! assert_eq!(summary.min, 0.0);
//! assert_eq!(summary.max, 20.0);
//!
//! // Interpolated point read
//! let mut iter = channel.make_iterator();
//! iter.seek_at(0.5);
//! assert_eq!(iter.read_value()?, 5.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Channel`]: Top-level handle; owns one pyramid plus name and units
//! - [`Pyramid`]: Raw samples (level 0) and the summary levels above them
//! - [`ChannelIterator`]: Borrowing cursor for seeks, steps and interpolated reads
//! - [`IntervalSummary`]: Mean/min/max/count of a run of samples
//!
//! ## Modules
//!
//! For lower-level access, the individual modules are also public:
//!
//! - [`channel`]: The channel facade
//! - [`pyramid`]: Level propagation, eviction, rebuild and interval queries
//! - [`query`]: Level selection and query result types
//! - [`buffer`]: Ordered ring-buffer storage for one level
//! - [`summary`]: Summary value types and merge rules
//! - [`iter`]: Iterator over raw samples
//! - [`interpolate`]: Interpolation kernels
//! - [`config`]: Channel configuration
//! - [`error`]: Error types

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod iter;
pub mod pyramid;
pub mod query;
pub mod sample;
pub mod summary;

// Re-export primary API types at crate root for convenience.
pub use channel::Channel;
pub use config::{Capacity, ChannelConfig, InterpolationMode};
pub use error::{Result, RtgError};
pub use iter::ChannelIterator;
pub use pyramid::Pyramid;
pub use query::{IntervalQuery, SampleRange};
pub use sample::Sample;
pub use summary::IntervalSummary;
