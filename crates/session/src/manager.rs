use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use exn::{Exn, OptionExt, ResultExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Span, instrument};
use url::Url;

use crate::auth;
use crate::cancel::Cancel;
use crate::classify::classify;
use crate::config::SessionConfig;
use crate::cookies::CookieJar;
use crate::error::{ErrorKind, Result};
use crate::store::{CookieStore, CredentialProvider, MemoryCookieStore, NoCredentials};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

/// Mutable state shared by every request made through one manager.
#[derive(Debug, Default)]
struct Session {
    jar: CookieJar,
    /// Whether the cookie store has been consulted yet.
    loaded: bool,
    authenticated: bool,
    /// Index into the configured domains.
    domain: usize,
    /// Bumped on every successful login, so callers that raced into a
    /// re-authentication can tell someone else already did it.
    generation: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    successes: AtomicU64,
    logins: AtomicU64,
    rotations: AtomicU64,
}

/// Running totals for one manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// HTTP exchanges sent, counting redirect hops and retries.
    pub requests: u64,
    /// Requests that ended in usable content.
    pub successes: u64,
    pub logins: u64,
    /// Switches to a mirror domain after a challenge.
    pub rotations: u64,
}

/// Owns the conversation with the catalog site: cookies, login state, mirror
/// selection, response classification and retries.
///
/// One manager is meant to be shared (behind an [`Arc`]) by everything that
/// talks to the site, so that cookie updates and re-authentication are
/// serialized in one place.
pub struct SessionManager<T: Transport> {
    transport: T,
    config: SessionConfig,
    domains: Vec<Url>,
    credentials: Arc<dyn CredentialProvider>,
    cookie_store: Arc<dyn CookieStore>,
    session: Mutex<Session>,
    /// Held for the whole login flow; never taken while `session` is held.
    auth_gate: Mutex<()>,
    last_request: Mutex<Option<Instant>>,
    counters: Counters,
}

impl<T: Transport> SessionManager<T> {
    /// An anonymous manager with an in-memory cookie jar.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] when the configured domains are unusable.
    pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
        let domains = config.base_urls()?;
        Ok(Self {
            transport,
            config,
            domains,
            credentials: Arc::new(NoCredentials),
            cookie_store: Arc::new(MemoryCookieStore::new()),
            session: Mutex::new(Session::default()),
            auth_gate: Mutex::new(()),
            last_request: Mutex::new(None),
            counters: Counters::default(),
        })
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cookie_store(mut self, cookie_store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = cookie_store;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Base URL currently in use.
    pub async fn base_url(&self) -> Url {
        let index = self.session.lock().await.domain;
        self.domains[index].clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.authenticated
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            successes: self.counters.successes.load(Ordering::Relaxed),
            logins: self.counters.logins.load(Ordering::Relaxed),
            rotations: self.counters.rotations.load(Ordering::Relaxed),
        }
    }

    /// Performs one logical request and returns a response whose body is
    /// real content.
    ///
    /// `path` is resolved against the active domain; absolute URLs (image
    /// CDNs) are used as they are and never receive the site's cookies.
    /// `params` become the query string for `GET` and the form body for
    /// `POST`.
    ///
    /// Transient failures are retried under the configured
    /// [`RetryPolicy`](crate::RetryPolicy). A challenge or a bounce to the
    /// login page triggers at most one re-authentication per call (when
    /// credentials exist), and a challenge moves the session to the next
    /// mirror domain.
    ///
    /// # Errors
    /// The last failure once retries are exhausted, or the first permanent
    /// one: [`ErrorKind::NotFound`], [`ErrorKind::Rejected`],
    /// [`ErrorKind::Authentication`], [`ErrorKind::Cancelled`], ...
    #[instrument(skip_all, fields(method = %method, path = %path, attempts))]
    pub async fn request<I, K, V>(&self, method: Method, path: &str, params: I, cancel: &Cancel) -> Result<HttpResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        self.ensure_loaded().await;
        let mut reauthenticated = false;
        let result = self
            .config
            .retry
            .run(cancel, async |attempt| {
                Span::current().record("attempts", attempt);
                self.attempt(method, path, &params, &mut reauthenticated, cancel).await
            })
            .await;
        if let Err(err) = &result {
            tracing::debug!(error = %**err, "request failed");
        }
        result
    }

    async fn attempt(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        reauthenticated: &mut bool,
        cancel: &Cancel,
    ) -> Result<HttpResponse> {
        let (domain, generation) = {
            let session = self.session.lock().await;
            (session.domain, session.generation)
        };
        let mut url = self.resolve(domain, path)?;
        let form = match method {
            Method::Get => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(params);
                }
                None
            },
            Method::Post => Some(params.to_vec()),
        };
        let on_site = self.is_site(&url);
        let response = self.exchange(method, url.clone(), form, cancel).await?;
        let kind = match classify(&response, url.path(), &self.config) {
            Ok(()) => {
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                return Ok(response);
            },
            Err(kind) => kind,
        };
        if !on_site {
            exn::bail!(kind);
        }
        let has_credentials = self.credentials.credentials().is_some();
        match &kind {
            ErrorKind::LoginRequired(_) if !has_credentials => {
                exn::bail!(ErrorKind::Authentication(format!("{path} requires a login and no credentials are configured")));
            },
            ErrorKind::LoginRequired(_) if !*reauthenticated => {
                *reauthenticated = true;
                self.reauthenticate(generation, cancel).await?;
            },
            ErrorKind::ChallengeDetected(_) => {
                let lacks_auth = !self.session.lock().await.jar.contains(&self.config.auth_cookie);
                if has_credentials && lacks_auth && !*reauthenticated {
                    *reauthenticated = true;
                    self.reauthenticate(generation, cancel).await?;
                }
                self.rotate(domain).await;
            },
            _ => {},
        }
        Err(Exn::from(kind))
    }

    /// Logs in with the configured credentials, confirms the age gate and
    /// saves the resulting cookies.
    ///
    /// # Errors
    /// [`ErrorKind::Authentication`] when there are no credentials, the
    /// login page has no form token, or the site rejects the credentials.
    /// Transport and classification errors pass through unchanged.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, cancel: &Cancel) -> Result<()> {
        self.ensure_loaded().await;
        let _gate = self.auth_gate.lock().await;
        self.login(cancel).await
    }

    /// Re-authenticates unless another caller already did since `seen`.
    async fn reauthenticate(&self, seen: u64, cancel: &Cancel) -> Result<()> {
        let _gate = self.auth_gate.lock().await;
        if self.session.lock().await.generation != seen {
            tracing::debug!("session was refreshed by another request");
            return Ok(());
        }
        self.login(cancel).await
    }

    async fn login(&self, cancel: &Cancel) -> Result<()> {
        let credentials = self
            .credentials
            .credentials()
            .ok_or_raise(|| ErrorKind::Authentication("no credentials configured".to_string()))?;
        let domain = self.session.lock().await.domain;
        tracing::info!(domain = %self.domains[domain], user = %credentials.username, "logging in");

        let login_url = self.resolve(domain, &self.config.login_path)?;
        let page = self.exchange(Method::Get, login_url.clone(), None, cancel).await?;
        classify(&page, login_url.path(), &self.config).map_err(Exn::from)?;
        let token = auth::authenticity_token(&page.text())
            .ok_or_raise(|| ErrorKind::Authentication("login page carries no authenticity token".to_string()))?;

        let form = vec![
            ("authenticity_token".to_string(), token),
            ("user[email]".to_string(), credentials.username),
            ("user[password]".to_string(), credentials.password),
            ("user[remember_me]".to_string(), "1".to_string()),
        ];
        let answer = self.exchange(Method::Post, login_url.clone(), Some(form), cancel).await?;
        let landed = answer.url.path();
        if landed == self.config.login_path || landed == self.config.sign_in_path || auth::has_login_form(&answer.text())
        {
            exn::bail!(ErrorKind::Authentication("credentials were rejected".to_string()));
        }
        if !answer.is_success() {
            exn::bail!(ErrorKind::Authentication(format!("login answered HTTP {}", answer.status)));
        }

        let over18 = self.resolve(domain, &self.config.over18_path)?;
        match self.exchange(Method::Get, over18.clone(), None, cancel).await {
            Ok(response) if response.is_success() => {},
            Ok(response) => tracing::warn!(status = response.status, "age gate confirmation refused"),
            Err(err) if *err == ErrorKind::Cancelled => return Err(err),
            Err(err) => tracing::warn!(error = %*err, "age gate confirmation failed"),
        }

        let blob = {
            let mut session = self.session.lock().await;
            session.authenticated = true;
            session.generation += 1;
            session.jar.to_blob()
        };
        self.counters.logins.fetch_add(1, Ordering::Relaxed);
        match blob {
            Ok(blob) => {
                if let Err(err) = self.cookie_store.save(&blob).await {
                    tracing::warn!(error = %*err, "unable to persist cookies");
                }
            },
            Err(err) => tracing::warn!(error = %*err, "unable to serialize cookies"),
        }
        Ok(())
    }

    /// One exchange, following redirects ourselves so every hop's
    /// `Set-Cookie` lands in the jar.
    async fn exchange(
        &self,
        mut method: Method,
        mut url: Url,
        mut form: Option<Vec<(String, String)>>,
        cancel: &Cancel,
    ) -> Result<HttpResponse> {
        let origin = url.to_string();
        for _ in 0..=self.config.max_redirects {
            self.throttle(cancel).await?;
            let on_site = self.is_site(&url);
            let request = HttpRequest {
                method,
                url: url.clone(),
                headers: self.headers_for(on_site).await,
                form: form.clone(),
                timeout: Duration::from_millis(self.config.timeout_ms),
            };
            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%method, %url, "sending");
            let response = cancel
                .run(self.transport.send(request))
                .await
                .ok_or_raise(|| ErrorKind::Cancelled)??;
            if on_site {
                let mut session = self.session.lock().await;
                for header in response.headers_all("set-cookie") {
                    session.jar.apply_set_cookie(header);
                }
            }
            if !response.is_redirect() {
                return Ok(response);
            }
            let location = response
                .header("location")
                .ok_or_raise(|| ErrorKind::Redirects(format!("{url} redirected without a location")))?;
            url = url.join(location).or_raise(|| ErrorKind::Redirects(format!("{url} redirected to {location}")))?;
            if matches!(response.status, 301..=303) {
                method = Method::Get;
                form = None;
            }
        }
        exn::bail!(ErrorKind::Redirects(origin))
    }

    async fn headers_for(&self, on_site: bool) -> Vec<(String, String)> {
        let fingerprint = &self.config.fingerprint;
        let mut headers = Vec::with_capacity(fingerprint.headers.len() + 2);
        headers.push(("User-Agent".to_string(), fingerprint.user_agent.clone()));
        headers.extend(fingerprint.headers.iter().cloned());
        if on_site && let Some(cookies) = self.session.lock().await.jar.header_value() {
            headers.push(("Cookie".to_string(), cookies));
        }
        headers
    }

    async fn throttle(&self, cancel: &Cancel) -> Result<()> {
        if self.config.min_interval_ms == 0 {
            return Ok(());
        }
        let interval = Duration::from_millis(self.config.min_interval_ms);
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready = previous + interval;
            if ready > Instant::now() && !cancel.sleep(ready - Instant::now()).await {
                exn::bail!(ErrorKind::Cancelled);
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    fn resolve(&self, domain: usize, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path)
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(url);
        }
        let url = if let Some(rest) = path.strip_prefix("//") {
            Url::parse(&format!("https://{rest}"))
        } else {
            self.domains[domain].join(path)
        };
        url.or_raise(|| ErrorKind::Config(format!("unusable request path: {path}")))
    }

    fn is_site(&self, url: &Url) -> bool {
        self.domains.iter().any(|domain| domain.host_str() == url.host_str())
    }

    async fn rotate(&self, from: usize) {
        if self.domains.len() < 2 {
            return;
        }
        let mut session = self.session.lock().await;
        if session.domain != from {
            return;
        }
        session.domain = (from + 1) % self.domains.len();
        self.counters.rotations.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(from = %self.domains[from], to = %self.domains[session.domain], "challenged, switching mirror");
    }

    async fn ensure_loaded(&self) {
        let mut session = self.session.lock().await;
        if session.loaded {
            return;
        }
        session.loaded = true;
        let blob = match self.cookie_store.load().await {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %*err, "unable to load saved cookies");
                return;
            },
        };
        match CookieJar::from_blob(&blob) {
            Ok(jar) => {
                session.authenticated = jar.contains(&self.config.auth_cookie);
                tracing::debug!(cookies = jar.len(), authenticated = session.authenticated, "restored cookies");
                session.jar = jar;
            },
            Err(err) => tracing::warn!(error = %*err, "ignoring unreadable saved cookies"),
        }
    }
}
