use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ErrorKind, Result};
use crate::retry::RetryPolicy;

const CHROME_120: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A browser whose TLS and HTTP/2 handshake can be reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    Chrome120,
    Chrome131,
    Firefox133,
    Safari18,
}

/// Browser identity presented on every request.
///
/// Headers are sent in the order listed. `impersonate` picks whose handshake
/// the connection itself reproduces; [`HttpTransport`](crate::HttpTransport)
/// honors it when the crate is built with the `impersonate` feature and
/// otherwise falls back to a plain rustls client with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fingerprint {
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    /// `None` shapes headers only.
    pub impersonate: Option<Browser>,
    /// Some challenge pages treat HTTP/2 clients differently.
    pub http1_only: bool,
}

impl Default for Fingerprint {
    fn default() -> Self {
        let headers = [
            ("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
            ("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8,ja;q=0.7"),
            ("Cache-Control", "max-age=0"),
            ("Sec-Ch-Ua", r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#),
            ("Sec-Ch-Ua-Mobile", "?0"),
            ("Sec-Ch-Ua-Platform", r#""Windows""#),
            ("Sec-Fetch-Dest", "document"),
            ("Sec-Fetch-Mode", "navigate"),
            ("Sec-Fetch-Site", "none"),
            ("Sec-Fetch-User", "?1"),
            ("Upgrade-Insecure-Requests", "1"),
        ];
        Self {
            user_agent: CHROME_120.to_string(),
            headers: headers.into_iter().map(|(name, value)| (name.to_string(), value.to_string())).collect(),
            impersonate: Some(Browser::Chrome120),
            http1_only: false,
        }
    }
}

/// Everything [`SessionManager`](crate::SessionManager) needs to know about
/// the site and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URLs, primary first. Challenges rotate through the rest.
    pub domains: Vec<String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
    pub max_redirects: u8,
    /// Minimum spacing between consecutive requests; zero disables.
    pub min_interval_ms: u64,
    /// Cookie whose presence means the jar holds a logged-in session.
    pub auth_cookie: String,
    /// Byte strings that only appear on the anti-bot interstitial.
    pub challenge_markers: Vec<String>,
    pub login_path: String,
    pub sign_in_path: String,
    /// Age-gate confirmation, requested right after logging in.
    pub over18_path: String,
    pub fingerprint: Fingerprint,
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domains: ["https://javdb.com", "https://javdb570.com", "https://javdb372.com"]
                .map(String::from)
                .to_vec(),
            timeout_ms: 30_000,
            max_redirects: 10,
            min_interval_ms: 0,
            auth_cookie: "remember_me_token".to_string(),
            challenge_markers: [
                "challenge-platform",
                "cf-browser-verification",
                "cf_chl_opt",
                "<title>Just a moment...</title>",
            ]
            .map(String::from)
            .to_vec(),
            login_path: "/login".to_string(),
            sign_in_path: "/users/sign_in".to_string(),
            over18_path: "/over18?respond=1".to_string(),
            fingerprint: Fingerprint::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Parsed base URLs.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] when there are none, or one isn't an absolute
    /// http(s) URL.
    pub fn base_urls(&self) -> Result<Vec<Url>> {
        if self.domains.is_empty() {
            exn::bail!(ErrorKind::Config("no site domains configured".to_string()));
        }
        self.domains
            .iter()
            .map(|domain| match Url::parse(domain) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(url),
                _ => Err(exn::Exn::from(ErrorKind::Config(format!("invalid site domain: {domain}")))),
            })
            .collect()
    }
}
