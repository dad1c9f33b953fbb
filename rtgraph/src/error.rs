//! Error types for the rtgraph channel store.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all rtgraph operations.
///
/// This enum covers every failure a channel can report, from rejected
/// samples on the write path to invalid ranges on the read path.
#[derive(Error, Debug)]
pub enum RtgError {
    /// Error during sample insertion (write path).
    #[error("insert error: {0}")]
    Insert(#[from] InsertError),

    /// Error during interval or range queries (read path).
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// Error during iterator movement or reads.
    #[error("iterator error: {0}")]
    Iterator(#[from] IteratorError),

    /// Error during configuration validation or loading.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur when adding samples.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsertError {
    /// The sample's x precedes the last stored raw sample.
    ///
    /// Recoverable: the caller may discard the sample or insert it through
    /// the rebuild path.
    #[error("out-of-order insertion: x {x} precedes last stored x {last_x}")]
    OutOfOrder {
        /// The rejected x position.
        x: f64,
        /// The x position of the newest stored entry.
        last_x: f64,
    },

    /// The sample carries a value the store cannot aggregate.
    #[error("invalid sample ({x}, {y}): {reason}")]
    InvalidSample {
        /// The rejected x position.
        x: f64,
        /// The rejected y value.
        y: f64,
        /// Why the sample is invalid.
        reason: String,
    },
}

/// Errors that can occur during queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The query interval has `x_lo > x_hi` or a NaN bound.
    #[error("invalid range: x_lo {x_lo} > x_hi {x_hi}")]
    InvalidRange {
        /// Lower bound of the request.
        x_lo: f64,
        /// Upper bound of the request.
        x_hi: f64,
    },

    /// The query was issued before any data exists.
    #[error("channel is empty")]
    EmptyChannel,

    /// The channel has data, but none inside the requested interval.
    #[error("no data available for range [{x_lo}, {x_hi}]")]
    NoData {
        /// Lower bound of the request.
        x_lo: f64,
        /// Upper bound of the request.
        x_hi: f64,
    },
}

/// Errors that can occur when using a [`ChannelIterator`](crate::iter::ChannelIterator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IteratorError {
    /// The iterator has fallen outside the buffer bounds (or was never seeked).
    #[error("iterator is not positioned on stored data")]
    Invalid,
}

/// Errors that can occur during configuration validation or loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A capacity, geometry or interpolation setting is nonsensical.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of what is invalid.
        reason: String,
    },

    /// An interpolation mode name could not be parsed.
    #[error("unknown interpolation mode '{name}' (expected previous, nearest, linear or smooth)")]
    UnknownInterpolation {
        /// The unrecognized name.
        name: String,
    },

    /// Failed to read a configuration file.
    #[error("failed to load configuration from '{}': {source}", path.display())]
    Load {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file.
    #[error("failed to parse configuration from '{}': {source}", path.display())]
    Parse {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, RtgError>`.
pub type Result<T> = std::result::Result<T, RtgError>;
