//! Image and media URL normalization.

use url::Url;

use crate::models::Code;

const LOW_RES_MARKER: &str = "_s_";
const HIGH_RES_MARKER: &str = "_l_";
const DEFAULT_EXTENSION: &str = "jpg";

/// Points a sample thumbnail at its high-resolution variant.
///
/// ```rust
/// use jdb_extract::upgrade_image_url;
/// assert_eq!(
///     upgrade_image_url("https://c0.jdbstatic.com/samples/yw/YwG8Ve_s_0.jpg"),
///     "https://c0.jdbstatic.com/samples/yw/YwG8Ve_l_0.jpg",
/// );
/// assert_eq!(upgrade_image_url("https://c0.jdbstatic.com/covers/yw/YwG8Ve.jpg"), "https://c0.jdbstatic.com/covers/yw/YwG8Ve.jpg");
/// ```
pub fn upgrade_image_url(url: &str) -> String {
    url.replace(LOW_RES_MARKER, HIGH_RES_MARKER)
}

/// Resolves a `src`/`href` attribute against the page it came from.
/// Protocol-relative URLs always get `https:`, whatever the page scheme.
pub fn absolutize(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    base.join(src).ok().map(String::from)
}

/// Sink name for the `index`th (1-based) image of a record:
/// `MIDA-583/00001.jpg`.
pub fn image_key(code: &Code, index: usize, url: &str) -> String {
    format!("{}/{index:05}.{}", code.path_segment(), extension(url))
}

fn extension(url: &str) -> String {
    let path = Url::parse(url).map(|url| url.path().to_string()).unwrap_or_else(|_| url.to_string());
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
