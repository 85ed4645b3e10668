//! The seam between [`SessionManager`](crate::SessionManager) and the wire.
//!
//! A transport sends exactly one request and hands back exactly one
//! response: no redirects followed, no cookies remembered, no status codes
//! judged. All of that belongs to the manager, so a scripted
//! [`MockTransport`] exercises the same code paths as the real client.

mod http;
#[cfg(feature = "impersonate")]
mod impersonate;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::{HttpTransport, ReqwestTransport};
#[cfg(feature = "impersonate")]
pub use self::impersonate::ImpersonatingTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockResponse, MockTransport, RecordedRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// One outgoing request, fully resolved.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    /// Sent in order; the manager puts the fingerprint headers first.
    pub headers: Vec<(String, String)>,
    /// URL-encoded body for `POST`.
    pub form: Option<Vec<(String, String)>>,
    pub timeout: Duration,
}

/// One response, body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL the response came from.
    pub url: Url,
    /// Header names are lowercase. Repeated headers (`Set-Cookie`) appear
    /// once per value.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers_all(name).next()
    }

    /// Every value of header `name` (case-insensitive).
    pub fn headers_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(&name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as UTF-8, replacing anything invalid.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// Sends a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// [`ErrorKind::Network`](crate::error::ErrorKind::Network) when no
    /// response was received at all. Any HTTP status, including 4xx/5xx, is
    /// a successful exchange.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}
