//! Collaborators the session leans on but doesn't own: somewhere to keep the
//! cookie blob between runs, and somewhere to get login credentials from.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use exn::ResultExt;
use tokio::sync::RwLock;

use crate::error::{ErrorKind, Result};

/// Load/save pair for the opaque cookie blob.
#[async_trait]
pub trait CookieStore: Send + Sync {
    /// The last saved blob, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    async fn save(&self, blob: &[u8]) -> Result<()>;
}

/// Cookie store that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    blob: RwLock<Option<Vec<u8>>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `blob`, as if a previous run saved it.
    pub fn with_blob(blob: impl Into<Vec<u8>>) -> Self {
        Self {
            blob: RwLock::new(Some(blob.into())),
        }
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blob.read().await.clone())
    }

    async fn save(&self, blob: &[u8]) -> Result<()> {
        *self.blob.write().await = Some(blob.to_vec());
        Ok(())
    }
}

/// Cookie store backed by a single file.
#[derive(Debug, Clone)]
pub struct FileCookieStore {
    path: PathBuf,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).or_raise(|| ErrorKind::CookieStore(format!("unable to read {}", self.path.display()))),
        }
    }

    async fn save(&self, blob: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .or_raise(|| ErrorKind::CookieStore(format!("unable to create {}", parent.display())))?;
        }
        tokio::fs::write(&self.path, blob)
            .await
            .or_raise(|| ErrorKind::CookieStore(format!("unable to write {}", self.path.display())))
    }
}

/// Login details for the catalog site.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of login credentials; `None` means "browse anonymously".
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

/// Provider for anonymous sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credentials(&self) -> Option<Credentials> {
        None
    }
}
