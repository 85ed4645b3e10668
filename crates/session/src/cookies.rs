use std::collections::BTreeMap;

use exn::ResultExt;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};

/// Name → value cookies for the catalog site.
///
/// The site and its mirrors share one jar; attributes such as `Path` and
/// `Domain` are not tracked. Serialized as a flat JSON object, which is also
/// the blob handed to the [`CookieStore`](crate::CookieStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar(BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// [`ErrorKind::CookieStore`] when the blob isn't a JSON object of strings.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).or_raise(|| ErrorKind::CookieStore("malformed cookie blob".to_string()))
    }

    /// # Errors
    /// Serialization of a string map can't really fail, but `serde_json` says
    /// it might.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::CookieStore("unable to serialize cookies".to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies one `Set-Cookie` header value. A cookie with an empty value or
    /// a non-positive `Max-Age` is a deletion. Returns `true` if the jar
    /// changed.
    pub fn apply_set_cookie(&mut self, header: &str) -> bool {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return false;
        };
        let (name, value) = (name.trim(), value.trim().trim_matches('"'));
        if name.is_empty() {
            return false;
        }
        let expired = parts.filter_map(|attribute| attribute.split_once('=')).any(|(key, val)| {
            key.trim().eq_ignore_ascii_case("max-age") && val.trim().parse::<i64>().is_ok_and(|age| age <= 0)
        });
        if value.is_empty() || expired {
            return self.remove(name).is_some();
        }
        self.0.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
    }

    /// `Cookie` request header value, or `None` for an empty jar.
    pub fn header_value(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.0.iter().map(|(name, value)| format!("{name}={value}")).collect::<Vec<_>>().join("; "))
    }
}
