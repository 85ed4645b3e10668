use std::sync::Arc;

use jdb_extract::models::FullRecord;
use jdb_extract::parse_detail;
use jdb_session::{Cancel, Method, SessionManager, Transport};
use tracing::instrument;

use crate::config::CatalogConfig;
use crate::error::{ErrorKind, Result};

/// Reads detail pages.
pub struct DetailExtractor<T: Transport> {
    session: Arc<SessionManager<T>>,
    config: Arc<CatalogConfig>,
}

impl<T: Transport> Clone for DetailExtractor<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Transport> DetailExtractor<T> {
    pub fn new(session: Arc<SessionManager<T>>, config: Arc<CatalogConfig>) -> Self {
        Self { session, config }
    }

    /// Fetches and parses the detail page of record `id` (`YwG8Ve`).
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidQuery`] for an empty id,
    /// - [`ErrorKind::Parse`] when a required field can't be found, after one
    ///   refetch,
    /// - [`ErrorKind::NotFound`] and every other session failure.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_detail(&self, id: &str, cancel: &Cancel) -> Result<FullRecord> {
        let id = id.trim();
        if id.is_empty() {
            exn::bail!(ErrorKind::InvalidQuery("empty record id".to_string()));
        }
        let path = self.config.site.detail(id);
        self.config
            .parse_retry
            .run(cancel, async |_| self.fetch_once(id, &path, cancel).await)
            .await
    }

    async fn fetch_once(&self, id: &str, path: &str, cancel: &Cancel) -> Result<FullRecord> {
        let no_params: [(String, String); 0] = [];
        let response = self
            .session
            .request(Method::Get, path, no_params, cancel)
            .await
            .map_err(ErrorKind::session)?;
        parse_detail(&response.text(), id, &response.url).map_err(ErrorKind::extract)
    }
}
