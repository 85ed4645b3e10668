//! Scripted transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::{ErrorKind, Result};

/// A canned response, or a canned connection failure.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    network_error: bool,
    delay: Duration,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            network_error: false,
            delay: Duration::ZERO,
        }
    }

    /// 200 with `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200).with_body(body)
    }

    /// 302 to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::status(302).with_header("Location", location)
    }

    /// The connection fails before any response.
    pub fn network_error() -> Self {
        Self {
            network_error: true,
            ..Self::status(0)
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_cookie(self, set_cookie: &str) -> Self {
        self.with_header("Set-Cookie", set_cookie)
    }

    /// Holds the answer back for `delay` of tokio time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: url::Url,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
    /// Tokio time, so paused-clock tests can measure gaps.
    pub at: Instant,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form.as_ref()?.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Path plus query, the way routes are keyed.
    pub fn target(&self) -> String {
        route_key(&self.url)
    }
}

fn route_key(url: &url::Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

/// [`Transport`] answering from per-route scripts.
///
/// Routes are keyed by path plus query string, so every mirror domain hits
/// the same script. Each route replays its responses in order and then keeps
/// repeating the last one. Unscripted routes answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `responses` to the script for `target` (`/path?query`).
    pub fn route(self, target: &str, responses: impl IntoIterator<Item = MockResponse>) -> Self {
        self.push(target, responses);
        self
    }

    pub fn push(&self, target: &str, responses: impl IntoIterator<Item = MockResponse>) {
        let mut routes = self.routes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        routes.entry(target.to_string()).or_default().extend(responses);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// How many requests hit `target` (`/path?query`).
    pub fn count(&self, target: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|request| request.target() == target)
            .count()
    }

    fn next_response(&self, target: &str) -> Option<MockResponse> {
        let mut routes = self.routes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let script = routes.get_mut(target)?;
        if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let target = route_key(&request.url);
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers,
            form: request.form,
            at: Instant::now(),
        });
        let Some(scripted) = self.next_response(&target) else {
            return Ok(HttpResponse {
                status: 404,
                url: request.url,
                headers: Vec::new(),
                body: b"<html><body>404</body></html>".to_vec(),
            });
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        if scripted.network_error {
            exn::bail!(ErrorKind::Network(format!("connection reset: {target}")));
        }
        Ok(HttpResponse {
            status: scripted.status,
            url: request.url,
            headers: scripted.headers,
            body: scripted.body,
        })
    }
}
