//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The config file extension isn't one we can read.
    #[display("unsupported config format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A layer couldn't be read or doesn't fit the settings shape.
    #[display("unable to load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// Settings loaded but describe something unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// A file the settings point at couldn't be read or used.
    #[display("unable to read {_0}")]
    Io(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
