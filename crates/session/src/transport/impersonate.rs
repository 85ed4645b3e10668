use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use wreq_util::Emulation;

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::config::{Browser, SessionConfig};
use crate::error::{ErrorKind, Result};

/// [`Transport`] whose TLS and HTTP/2 handshake match a real browser's, so
/// the connection and the headers tell the same story.
///
/// Like [`ReqwestTransport`](super::ReqwestTransport) it follows no
/// redirects and keeps no cookies.
#[derive(Clone)]
pub struct ImpersonatingTransport {
    client: wreq::Client,
    browser: Browser,
}

impl fmt::Debug for ImpersonatingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonatingTransport").field("browser", &self.browser).finish_non_exhaustive()
    }
}

impl ImpersonatingTransport {
    /// # Errors
    /// [`ErrorKind::Config`] when the fingerprint names no browser or the
    /// client can't be built.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let browser = config
            .fingerprint
            .impersonate
            .ok_or_raise(|| ErrorKind::Config("fingerprint names no browser to impersonate".to_string()))?;
        let mut builder = wreq::Client::builder()
            .emulation(emulation(browser))
            .redirect(wreq::redirect::Policy::none())
            .timeout(Duration::from_millis(config.timeout_ms));
        if config.fingerprint.http1_only {
            builder = builder.http1_only();
        }
        let client = builder
            .build()
            .or_raise(|| ErrorKind::Config(format!("unable to build an HTTP client impersonating {browser:?}")))?;
        Ok(Self { client, browser })
    }
}

fn emulation(browser: Browser) -> Emulation {
    match browser {
        Browser::Chrome120 => Emulation::Chrome120,
        Browser::Chrome131 => Emulation::Chrome131,
        Browser::Firefox133 => Emulation::Firefox133,
        Browser::Safari18 => Emulation::Safari18,
    }
}

#[async_trait]
impl Transport for ImpersonatingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            form,
            timeout,
        } = request;
        let mut builder = match method {
            Method::Get => self.client.get(url.as_str()),
            Method::Post => self.client.post(url.as_str()),
        };
        // Request headers replace the emulation's defaults of the same name.
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(form) = &form {
            builder = builder.form(form);
        }
        let response = builder
            .timeout(timeout)
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("{method} {url}")))?;

        let status = response.status().as_u16();
        let final_url = url::Url::parse(response.url().as_str()).unwrap_or_else(|_| url.clone());
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::Network(format!("reading body of {url}")))?
            .to_vec();
        Ok(HttpResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: Method, url: Url) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: vec![("User-Agent".into(), "jdb-test".into())],
            form: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn redirects_reach_the_manager() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v/YwG8Ve"))
            .and(header("User-Agent", "jdb-test"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/users/sign_in")
                    .append_header("Set-Cookie", "_jdb_session=anon; path=/"),
            )
            .mount(&server)
            .await;
        let transport = ImpersonatingTransport::new(&SessionConfig::default()).unwrap();
        let url = Url::parse(&server.uri()).unwrap().join("/v/YwG8Ve").unwrap();
        let response = transport.send(request(Method::Get, url)).await.unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.header("location"), Some("/users/sign_in"));
        assert_eq!(response.header("set-cookie"), Some("_jdb_session=anon; path=/"));
    }

    #[tokio::test]
    async fn posts_login_forms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("authenticity_token=csrf-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;
        let transport = ImpersonatingTransport::new(&SessionConfig::default()).unwrap();
        let mut login = request(Method::Post, Url::parse(&server.uri()).unwrap().join("/login").unwrap());
        login.form = Some(vec![("authenticity_token".into(), "csrf-123".into())]);
        let response = transport.send(login).await.unwrap();
        assert_eq!(response.text(), "<html>ok</html>");
    }

    #[test]
    fn needs_a_browser() {
        let mut config = SessionConfig::default();
        config.fingerprint.impersonate = None;
        let err = ImpersonatingTransport::new(&config).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }
}
