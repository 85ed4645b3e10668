//! Shared entry into the HTML parser.

use scraper::Html;

use crate::consts;
use crate::error::{Error, ErrorKind, Result};
use crate::excerpt::{excerpt, is_complete};

/// Parses a full page, refusing bodies that were cut short.
pub(crate) fn parse(html: &str) -> Result<Html> {
    if !is_complete(html) {
        exn::bail!(ErrorKind::Truncated);
    }
    Ok(Html::parse_document(html))
}

/// A drift error carrying the start of the page body.
pub(crate) fn drift(document: &Html, what: &'static str) -> Error {
    let body = document
        .select(&consts::BODY)
        .next()
        .map(|body| body.html())
        .unwrap_or_else(|| document.html());
    tracing::warn!(what, "no known selector matched, upstream markup may have changed");
    exn::Exn::from(ErrorKind::Drift {
        what,
        fragment: excerpt(&body),
    })
}
