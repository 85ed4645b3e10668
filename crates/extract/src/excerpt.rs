//! Short excerpts of markup for error reports.

use memchr::memmem;

/// Upper bound on the markup an error carries along.
pub const EXCERPT_BYTES: usize = 2 * 1024;

/// The trimmed start of `html`, at most [`EXCERPT_BYTES`] long. The cut never
/// splits a character and drops a tag left open at the end.
pub fn excerpt(html: &str) -> String {
    let html = html.trim();
    if html.len() <= EXCERPT_BYTES {
        return html.to_string();
    }
    let mut end = EXCERPT_BYTES;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    let head = &html[..end];
    match head.rfind('<') {
        Some(open) if head.rfind('>').is_none_or(|close| close < open) => head[..open].to_string(),
        _ => head.to_string(),
    }
}

/// `true` when the body ends properly. A response cut off mid-transfer parses
/// without complaint in a forgiving HTML parser, so the closing tag is the
/// only reliable signal.
pub(crate) fn is_complete(html: &str) -> bool {
    let tail = &html.as_bytes()[html.len().saturating_sub(EXCERPT_BYTES)..];
    memmem::rfind(tail, b"</html>").is_some() || memmem::rfind(tail, b"</HTML>").is_some()
}
