//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Errors from the session, extraction and taxonomy crates
//! are raised into these kinds with their own frames kept as children, so the
//! full tree survives while callers only match on one enum.

use derive_more::{Display, Error};
use jdb_extract::error::{Error as ExtractError, ErrorKind as ExtractErrorKind};
use jdb_session::Retryable;
use jdb_session::error::{Error as SessionError, ErrorKind as SessionErrorKind};
use jdb_taxonomy::error::Error as TaxonomyError;
use serde::{Deserialize, Serialize};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Logging in failed, or a login is needed and no credentials exist.
    #[display("authentication failed: {_0}")]
    Authentication(#[error(not(source))] String),
    /// The anti-bot challenge outlasted every retry and mirror.
    #[display("anti-bot challenge: {_0}")]
    ChallengeDetected(#[error(not(source))] String),
    /// Throttled for longer than the retry budget.
    #[display("rate limited by upstream")]
    RateLimited,
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The page couldn't be turned into records: markup drift, a missing
    /// required field, a truncated body or an inconsistent listing.
    #[display("parse error in {field}")]
    Parse {
        /// Field or structural element that failed.
        field: String,
        /// Start of the offending markup, cut at a safe boundary.
        fragment: String,
    },
    /// Connection failures and upstream 5xx, after retries.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Permanent refusal (4xx, or content the upstream shouldn't have sent).
    #[display("rejected: {_0}")]
    Rejected(#[error(not(source))] String),
    #[display("operation cancelled")]
    Cancelled,
    /// The request itself is malformed: unknown tag, bad code, page 0.
    #[display("invalid query: {_0}")]
    InvalidQuery(#[error(not(source))] String),
    /// The byte sink refused a write, or none is configured.
    #[display("sink error: {_0}")]
    Sink(#[error(not(source))] String),
}

impl ErrorKind {
    /// Raise a session error into the catalog error tree.
    #[track_caller]
    pub fn session(err: SessionError) -> Error {
        let kind = match &*err {
            SessionErrorKind::Authentication(reason) => Self::Authentication(reason.clone()),
            SessionErrorKind::LoginRequired(path) => Self::Authentication(format!("login required for {path}")),
            SessionErrorKind::ChallengeDetected(url) => Self::ChallengeDetected(url.clone()),
            SessionErrorKind::RateLimited { .. } => Self::RateLimited,
            SessionErrorKind::NotFound(url) => Self::NotFound(url.clone()),
            SessionErrorKind::Rejected { status, url } => Self::Rejected(format!("HTTP {status} for {url}")),
            SessionErrorKind::Cancelled => Self::Cancelled,
            SessionErrorKind::Config(reason) => Self::InvalidQuery(reason.clone()),
            other => Self::Network(other.to_string()),
        };
        err.raise(kind)
    }

    /// Raise an extraction error into the catalog error tree.
    #[track_caller]
    pub fn extract(err: ExtractError) -> Error {
        let fragment = match &*err {
            ExtractErrorKind::ParseError { value, .. } => value.clone(),
            other => other.fragment().unwrap_or_default().to_string(),
        };
        let kind = Self::Parse {
            field: err.field().to_string(),
            fragment,
        };
        err.raise(kind)
    }

    /// Raise a taxonomy error into the catalog error tree.
    #[track_caller]
    pub fn taxonomy(err: TaxonomyError) -> Error {
        let kind = Self::InvalidQuery(err.to_string());
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    ///
    /// Only parse failures qualify: transport-level failures reaching this
    /// layer have already been through the session's own retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

impl Retryable for ErrorKind {
    fn is_retryable(&self) -> bool {
        ErrorKind::is_retryable(self)
    }

    fn cancelled() -> Self {
        Self::Cancelled
    }
}
