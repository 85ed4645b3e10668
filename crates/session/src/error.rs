//! Session Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The kinds mirror how the upstream answers: a response is
//! either usable, a challenge, a throttle, a missing page, or a refusal.

use std::time::Duration;

use derive_more::{Display, Error};

use crate::retry::Retryable;

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Logging in failed, or is needed and impossible (no credentials).
    #[display("authentication failed: {_0}")]
    Authentication(#[error(not(source))] String),
    /// The upstream served its anti-bot challenge instead of content.
    #[display("anti-bot challenge served for {_0}")]
    ChallengeDetected(#[error(not(source))] String),
    /// The upstream is throttling us.
    #[display("rate limited by upstream")]
    RateLimited {
        /// How long the upstream asked us to wait, if it said.
        retry_after: Option<Duration>,
    },
    /// The request was bounced to the login page.
    #[display("login required for {_0}")]
    LoginRequired(#[error(not(source))] String),
    /// HTTP 404.
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// A 4xx other than the ones above; asking again won't help.
    #[display("request rejected with HTTP {status}: {url}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// URL that was rejected.
        url: String,
    },
    /// A 5xx other than the ones that mean "challenge".
    #[display("upstream failure HTTP {status}: {url}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// URL that failed.
        url: String,
    },
    /// Connection, TLS, or timeout failure.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Redirect chain longer than allowed, or a redirect without a target.
    #[display("redirect loop from {_0}")]
    Redirects(#[error(not(source))] String),
    /// The caller's cancellation signal fired or its deadline passed.
    #[display("operation cancelled")]
    Cancelled,
    /// Loading or saving the cookie blob failed.
    #[display("cookie store error: {_0}")]
    CookieStore(#[error(not(source))] String),
    /// Settings that can't be turned into a working session.
    #[display("invalid session configuration: {_0}")]
    Config(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChallengeDetected(_)
                | Self::RateLimited { .. }
                | Self::LoginRequired(_)
                | Self::Upstream { .. }
                | Self::Network(_)
        )
    }
}

impl Retryable for ErrorKind {
    fn is_retryable(&self) -> bool {
        ErrorKind::is_retryable(self)
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    fn cancelled() -> Self {
        Self::Cancelled
    }
}
