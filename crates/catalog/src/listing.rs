use std::sync::Arc;

use jdb_extract::models::{ActorRef, SummaryRecord};
use jdb_extract::{excerpt, parse_actor_search, parse_listing};
use jdb_session::{Cancel, Method, SessionManager, Transport};
use tracing::{Span, instrument};

use crate::config::CatalogConfig;
use crate::error::{ErrorKind, Result};
use crate::page::{ListingSource, PageResult};

/// Reads listing pages and actor search results.
pub struct PageFetcher<T: Transport> {
    session: Arc<SessionManager<T>>,
    config: Arc<CatalogConfig>,
}

impl<T: Transport> Clone for PageFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(session: Arc<SessionManager<T>>, config: Arc<CatalogConfig>) -> Self {
        Self { session, config }
    }

    /// Fetches and parses one listing page.
    ///
    /// A page that can't be parsed is fetched once more before giving up,
    /// and so is a page with no items that still links to a next page.
    ///
    /// # Errors
    /// - [`ErrorKind::Parse`] for markup drift, truncation, or a listing that
    ///   contradicts itself,
    /// - [`ErrorKind::NotFound`] and every other session failure.
    #[instrument(skip(self, cancel), fields(%source, items))]
    pub async fn fetch_listing(&self, source: &ListingSource, cancel: &Cancel) -> Result<PageResult<SummaryRecord>> {
        let page = self
            .config
            .parse_retry
            .run(cancel, async |_| self.fetch_listing_once(source, cancel).await)
            .await?;
        Span::current().record("items", page.items.len());
        Ok(page)
    }

    async fn fetch_listing_once(&self, source: &ListingSource, cancel: &Cancel) -> Result<PageResult<SummaryRecord>> {
        let (path, params) = source.request(&self.config.site);
        let response = self
            .session
            .request(Method::Get, &path, params, cancel)
            .await
            .map_err(ErrorKind::session)?;
        let html = response.text();
        let listing = parse_listing(&html, &response.url).map_err(ErrorKind::extract)?;
        if listing.items.is_empty() && listing.has_next {
            tracing::warn!(%source, "listing has no items but links to a next page");
            exn::bail!(ErrorKind::Parse {
                field: "listing items".to_string(),
                fragment: excerpt(&html),
            });
        }
        Ok(PageResult {
            page: source.page(),
            has_next: listing.has_next,
            items: listing.items,
            failures: Vec::new(),
        })
    }

    /// Actor profiles whose alias list contains `name` exactly.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_actor_search(&self, name: &str, cancel: &Cancel) -> Result<Vec<ActorRef>> {
        let name = name.trim();
        if name.is_empty() {
            exn::bail!(ErrorKind::InvalidQuery("empty actor name".to_string()));
        }
        self.config
            .parse_retry
            .run(cancel, async |_| self.fetch_actor_search_once(name, cancel).await)
            .await
    }

    async fn fetch_actor_search_once(&self, name: &str, cancel: &Cancel) -> Result<Vec<ActorRef>> {
        let site = &self.config.site;
        let params = [
            (site.keyword_param.clone(), name.to_string()),
            (site.search_kind_param.clone(), site.actor_search_kind.clone()),
        ];
        let response = self
            .session
            .request(Method::Get, &site.search_path, params, cancel)
            .await
            .map_err(ErrorKind::session)?;
        parse_actor_search(&response.text(), name, &response.url).map_err(ErrorKind::extract)
    }
}
