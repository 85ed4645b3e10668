use std::time::Duration;

use async_trait::async_trait;
use exn::ResultExt;
use reqwest::redirect::Policy;

use super::{HttpRequest, HttpResponse, Method, Transport};
use crate::config::SessionConfig;
use crate::error::{ErrorKind, Result};

/// [`Transport`] over a real `reqwest` client.
///
/// Redirects are disabled so the manager sees every hop, and cookies are left
/// to the manager's jar.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    /// [`ErrorKind::Config`] when the client can't be built (TLS backend
    /// initialization failed).
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(Policy::none())
            .timeout(Duration::from_millis(config.timeout_ms))
            .gzip(true)
            .brotli(true);
        if config.fingerprint.http1_only {
            builder = builder.http1_only();
        }
        let client = builder.build().or_raise(|| ErrorKind::Config("unable to build HTTP client".to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            form,
            timeout,
        } = request;
        let mut builder = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
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
        let final_url = response.url().clone();
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

/// The client the fingerprint asks for: an impersonating one when a browser
/// is configured and the `impersonate` feature is built, plain `reqwest`
/// otherwise.
#[derive(Debug)]
pub enum HttpTransport {
    Plain(ReqwestTransport),
    #[cfg(feature = "impersonate")]
    Impersonating(super::ImpersonatingTransport),
}

impl HttpTransport {
    /// # Errors
    /// [`ErrorKind::Config`] when the selected client can't be built.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        match config.fingerprint.impersonate {
            #[cfg(feature = "impersonate")]
            Some(_) => Ok(Self::Impersonating(super::ImpersonatingTransport::new(config)?)),
            #[cfg(not(feature = "impersonate"))]
            Some(browser) => {
                tracing::warn!(?browser, "built without the impersonate feature, only headers match the browser");
                Ok(Self::Plain(ReqwestTransport::new(config)?))
            },
            None => Ok(Self::Plain(ReqwestTransport::new(config)?)),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        match self {
            Self::Plain(transport) => transport.send(request).await,
            #[cfg(feature = "impersonate")]
            Self::Impersonating(transport) => transport.send(request).await,
        }
    }
}
