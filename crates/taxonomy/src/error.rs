//! Taxonomy Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, same shape as every other crate in the workspace.

use derive_more::{Display, Error};

use crate::TagCategory;

/// A taxonomy error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for taxonomy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The snapshot is malformed, empty, or violates a load-time invariant.
    /// Fix the snapshot file; reloading the same bytes will fail again.
    #[display("invalid taxonomy snapshot: {_0}")]
    Snapshot(#[error(not(source))] String),
    /// No tag with this `(category, id)` pair exists in the snapshot.
    #[display("tag not found: {category}={id}")]
    NotFound {
        /// Category that was searched.
        category: TagCategory,
        /// Tag id that was searched.
        id: u32,
    },
    /// A selection referenced a tag id the snapshot doesn't know about.
    #[display("invalid tag in selection: {category}={id}")]
    InvalidTag {
        /// Category of the rejected id.
        category: TagCategory,
        /// The rejected id.
        id: u32,
    },
    /// A query must constrain at least one category.
    #[display("tag selection is empty")]
    EmptySelection,
    /// Page cursors start at 1.
    #[display("invalid page number: {_0}")]
    InvalidPage(#[error(not(source))] u32),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Everything in this crate is decided by static data: the snapshot is
        // either valid or it isn't, and a selection either resolves or not.
        false
    }
}
