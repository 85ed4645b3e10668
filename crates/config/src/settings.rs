use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use jdb_catalog::{Catalog, CatalogConfig};
use jdb_session::{
    CookieStore, CredentialProvider, Credentials, FileCookieStore, HttpTransport, MemoryCookieStore, NoCredentials,
    SessionConfig, SessionManager, Transport,
};
use jdb_taxonomy::TaxonomyIndex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Environment variables with this prefix override file settings; `__`
/// separates nesting levels (`JDB_CATALOG__PAGE_SIZE=20`).
pub const ENV_PREFIX: &str = "JDB_";

const COOKIE_FILE_NAME: &str = "cookies.json";

/// Per-user location of the persisted cookie jar, if the platform has one.
pub fn default_cookie_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "jdb", "jdb").map(|dirs| dirs.data_dir().join(COOKIE_FILE_NAME))
}

/// Account used to log in to the catalog site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to stand up a [`Catalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: SessionConfig,
    pub catalog: CatalogConfig,
    /// Taxonomy snapshot (JSON). Tag queries are impossible without one.
    pub taxonomy_snapshot: Option<PathBuf>,
    /// Where cookies persist between runs; `None` keeps them in memory.
    pub cookie_file: Option<PathBuf>,
    /// Browse anonymously when absent.
    pub login: Option<LoginConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            catalog: CatalogConfig::default(),
            taxonomy_snapshot: None,
            cookie_file: default_cookie_file(),
            login: None,
        }
    }
}

impl Settings {
    /// The layer stack: defaults, then `file` (format picked by extension),
    /// then the environment. Callers may merge further providers on top
    /// before handing it to [`from_figment`](Self::from_figment).
    ///
    /// # Errors
    /// - [`ErrorKind::Io`] when `file` doesn't exist,
    /// - [`ErrorKind::UnsupportedFormat`] for an unknown extension.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = file {
            if !path.is_file() {
                exn::bail!(ErrorKind::Io(path.display().to_string()));
            }
            let extension = path
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            figment = match extension.as_str() {
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                "json" => figment.merge(Json::file(path)),
                other => exn::bail!(ErrorKind::UnsupportedFormat(format!("{} ({other})", path.display()))),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Loads and validates settings from the default layer stack.
    #[instrument(level = "debug")]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// Extracts and validates settings from an arbitrary layer stack.
    ///
    /// # Errors
    /// [`ErrorKind::Load`] when a layer doesn't fit the settings shape and
    /// [`ErrorKind::Invalid`] when the result fails [`validate`](Self::validate).
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment
            .extract()
            .or_raise(|| ErrorKind::Load("settings don't match the expected shape".to_string()))?;
        settings.validate()?;
        tracing::debug!(
            domains = settings.session.domains.len(),
            authenticated = settings.login.is_some(),
            cookies = ?settings.cookie_file,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Rejects settings that would only fail later, mid-crawl.
    pub fn validate(&self) -> Result<()> {
        self.session
            .base_urls()
            .map_err(|err| err.raise(ErrorKind::Invalid("session.domains".to_string())))?;
        let catalog = &self.catalog;
        for (name, value) in [
            ("catalog.page_size", catalog.page_size),
            ("catalog.detail_workers", catalog.detail_workers),
            ("catalog.image_workers", catalog.image_workers),
            ("catalog.max_pages", catalog.max_pages as usize),
        ] {
            if value == 0 {
                exn::bail!(ErrorKind::Invalid(format!("{name} must be positive")));
            }
        }
        if let Some(login) = &self.login
            && (login.username.trim().is_empty() || login.password.is_empty())
        {
            exn::bail!(ErrorKind::Invalid("login needs both a username and a password".to_string()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Arc<dyn CredentialProvider> {
        match &self.login {
            Some(login) => Arc::new(Credentials::new(&login.username, &login.password)),
            None => Arc::new(NoCredentials),
        }
    }

    pub fn cookie_store(&self) -> Arc<dyn CookieStore> {
        match &self.cookie_file {
            Some(path) => Arc::new(FileCookieStore::new(path)),
            None => Arc::new(MemoryCookieStore::new()),
        }
    }

    /// Reads and indexes the taxonomy snapshot.
    ///
    /// # Errors
    /// [`ErrorKind::Invalid`] when no snapshot is configured or it doesn't
    /// load, [`ErrorKind::Io`] when it can't be read.
    pub fn taxonomy(&self) -> Result<TaxonomyIndex> {
        let path = self
            .taxonomy_snapshot
            .as_deref()
            .ok_or_raise(|| ErrorKind::Invalid("taxonomy_snapshot is not set".to_string()))?;
        let bytes = std::fs::read(path).or_raise(|| ErrorKind::Io(path.display().to_string()))?;
        TaxonomyIndex::load(bytes).map_err(|err| err.raise(ErrorKind::Invalid(path.display().to_string())))
    }

    /// The HTTP client the session fingerprint selects.
    pub fn transport(&self) -> Result<HttpTransport> {
        HttpTransport::new(&self.session).map_err(|err| err.raise(ErrorKind::Invalid("session.fingerprint".to_string())))
    }

    /// Wires a session and catalog over `transport` from these settings.
    pub fn build_catalog<T: Transport>(&self, transport: T) -> Result<Catalog<T>> {
        let session = SessionManager::new(transport, self.session.clone())
            .map_err(|err| err.raise(ErrorKind::Invalid("session".to_string())))?
            .with_credentials(self.credentials())
            .with_cookie_store(self.cookie_store());
        Ok(Catalog::new(Arc::new(session), Arc::new(self.taxonomy()?), self.catalog.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use jdb_session::{Browser, MockTransport};
    use rstest::rstest;

    use super::*;

    const SNAPSHOT: &str = include_str!("../../taxonomy/fixtures/snapshot.json");

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.catalog.page_size, 40);
        assert!(settings.login.is_none());
    }

    #[rstest]
    #[case("settings.toml", "[catalog]\npage_size = 20\n\n[session]\ndomains = [\"https://mirror.test\"]\n")]
    #[case("settings.yaml", "catalog:\n  page_size: 20\nsession:\n  domains:\n    - https://mirror.test\n")]
    #[case("settings.json", r#"{"catalog": {"page_size": 20}, "session": {"domains": ["https://mirror.test"]}}"#)]
    fn file_layers_over_defaults(#[case] name: &str, #[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, name, contents);
        let settings = Settings::from_figment(Settings::figment(Some(&path)).unwrap()).unwrap();
        assert_eq!(settings.catalog.page_size, 20);
        assert_eq!(settings.catalog.detail_workers, CatalogConfig::default().detail_workers);
        assert_eq!(settings.session.domains, vec!["https://mirror.test".to_string()]);
        assert_eq!(settings.session.timeout_ms, SessionConfig::default().timeout_ms);
    }

    #[test]
    fn fingerprint_browser_comes_from_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.yaml", "session:\n  fingerprint:\n    impersonate: safari18\n");
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.session.fingerprint.impersonate, Some(Browser::Safari18));

        let path = write_file(&dir, "plain.yaml", "session:\n  fingerprint:\n    impersonate: null\n");
        let settings = Settings::load(Some(&path)).unwrap();
        assert!(matches!(settings.transport().unwrap(), HttpTransport::Plain(_)));
    }

    #[test]
    fn later_layers_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.toml", "[catalog]\nmax_pages = 3\n");
        let figment = Settings::figment(Some(&path))
            .unwrap()
            .merge(Serialized::default("catalog.max_pages", 7));
        assert_eq!(Settings::from_figment(figment).unwrap().catalog.max_pages, 7);
    }

    #[test]
    fn unknown_format_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ini = write_file(&dir, "settings.ini", "page_size=1");
        let err = Settings::figment(Some(&ini)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));

        let err = Settings::figment(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }

    #[rstest]
    #[case("[catalog]\npage_size = 0\n")]
    #[case("[session]\ndomains = []\n")]
    #[case("[session]\ndomains = [\"not a url\"]\n")]
    #[case("[login]\nusername = \"\"\npassword = \"secret\"\n")]
    fn rejects_unusable_settings(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.toml", contents);
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
    }

    #[test]
    fn mistyped_values_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "settings.toml", "[catalog]\npage_size = \"many\"\n");
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Load(_)));
    }

    #[test]
    fn login_becomes_credentials() {
        let mut settings = Settings::default();
        assert!(settings.credentials().credentials().is_none());

        settings.login = Some(LoginConfig {
            username: "reader@example.com".to_string(),
            password: "hunter2".to_string(),
        });
        let credentials = settings.credentials().credentials().unwrap();
        assert_eq!(credentials.username, "reader@example.com");
        assert!(!format!("{:?}", settings.login).contains("hunter2"));
    }

    #[test]
    fn wires_a_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = write_file(&dir, "tags.json", SNAPSHOT);
        let settings = Settings {
            taxonomy_snapshot: Some(snapshot),
            cookie_file: Some(dir.path().join("cookies.json")),
            ..Settings::default()
        };
        let catalog = settings.build_catalog(MockTransport::new()).unwrap();
        assert!(catalog.taxonomy().search_by_name("巨乳").iter().any(|tag| tag.id == 17));
        assert_eq!(catalog.config(), &settings.catalog);
    }

    #[test]
    fn catalog_needs_a_snapshot() {
        let settings = Settings {
            taxonomy_snapshot: None,
            ..Settings::default()
        };
        let err = settings.build_catalog(MockTransport::new()).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));

        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            taxonomy_snapshot: Some(write_file(&dir, "tags.json", "{}")),
            ..Settings::default()
        };
        let err = settings.taxonomy().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }
}
