//! Extraction Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Every kind that comes from the markup itself carries a
//! truncated fragment of the offending document, so drift can be diagnosed
//! from logs without keeping the whole page around.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The body ended before its closing `</html>`; the transfer was cut short.
    #[display("truncated document: no closing </html>")]
    Truncated,
    /// None of the known selectors for a structural element matched. The
    /// upstream markup has probably changed.
    #[display("markup drift: no {what} matched any known selector")]
    Drift {
        /// The structural element that couldn't be located.
        what: &'static str,
        /// Start of the document, cut at a safe boundary.
        fragment: String,
    },
    /// A required field could not be found in the document.
    #[display("missing required field: {field}")]
    MissingField {
        /// The field that every strategy failed to produce.
        field: &'static str,
        /// Markup the strategies were run against, cut at a safe boundary.
        fragment: String,
    },
    /// A field was found but could not be parsed.
    #[display("failed to parse field '{field}', found value: {value}")]
    ParseError {
        /// The field that failed to parse.
        field: &'static str,
        /// Details about the parsing failure.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A cut-short body says nothing about the page itself. Everything else
        // is a property of the markup we were given.
        matches!(self, Self::Truncated)
    }

    /// Name of the field or element the error is about.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Truncated => "document",
            Self::Drift { what, .. } => what,
            Self::MissingField { field, .. } | Self::ParseError { field, .. } => field,
        }
    }

    /// Raw markup attached to the error, if any.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            Self::Drift { fragment, .. } | Self::MissingField { fragment, .. } => Some(fragment),
            Self::ParseError { value, .. } => Some(value),
            Self::Truncated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_truncation_is_retryable() {
        assert!(ErrorKind::Truncated.is_retryable());
        let drift = ErrorKind::Drift {
            what: "listing items",
            fragment: "<html>".to_string(),
        };
        assert!(!drift.is_retryable());
        assert_eq!(drift.field(), "listing items");
        assert_eq!(drift.fragment(), Some("<html>"));
    }

    #[test]
    fn display_omits_fragment() {
        let kind = ErrorKind::MissingField {
            field: "code",
            fragment: "<div class=\"panel-block\"></div>".to_string(),
        };
        assert_eq!(kind.to_string(), "missing required field: code");
    }
}
