mod auth;
mod cancel;
mod classify;
mod config;
mod cookies;
pub mod error;
mod manager;
mod retry;
mod store;
pub mod transport;

pub use crate::cancel::Cancel;
pub use crate::config::{Browser, Fingerprint, SessionConfig};
pub use crate::cookies::CookieJar;
pub use crate::manager::{SessionManager, SessionStats};
pub use crate::retry::{RetryPolicy, Retryable};
pub use crate::store::{CookieStore, CredentialProvider, Credentials, FileCookieStore, MemoryCookieStore, NoCredentials};
#[cfg(any(test, feature = "mock"))]
pub use crate::transport::{MockResponse, MockTransport};
#[cfg(feature = "impersonate")]
pub use crate::transport::ImpersonatingTransport;
pub use crate::transport::{HttpResponse, HttpTransport, Method, ReqwestTransport, Transport};
