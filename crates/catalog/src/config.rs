use jdb_session::RetryPolicy;
use jdb_taxonomy::QueryStyle;
use serde::{Deserialize, Serialize};

/// Where things live on the site. Paths may contain an `{id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Tag-filtered listing.
    pub tags_path: String,
    pub detail_path: String,
    /// An actor's works, newest first.
    pub actor_path: String,
    pub search_path: String,
    pub keyword_param: String,
    /// Parameter narrowing a search to one kind of result.
    pub search_kind_param: String,
    pub actor_search_kind: String,
    /// Rendering of tag queries. Its page parameter paginates every listing.
    pub query_style: QueryStyle,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            tags_path: "/tags".to_string(),
            detail_path: "/v/{id}".to_string(),
            actor_path: "/actors/{id}".to_string(),
            search_path: "/search".to_string(),
            keyword_param: "q".to_string(),
            search_kind_param: "f".to_string(),
            actor_search_kind: "actor".to_string(),
            query_style: QueryStyle::default(),
        }
    }
}

impl SiteConfig {
    pub(crate) fn detail(&self, id: &str) -> String {
        fill(&self.detail_path, id)
    }

    pub(crate) fn actor(&self, id: &str) -> String {
        fill(&self.actor_path, id)
    }
}

fn fill(template: &str, id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
    template.replace("{id}", &encoded)
}

/// Tuning for [`Catalog`](crate::Catalog) and its fetchers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub site: SiteConfig,
    /// Items on a full listing page. A page this full that claims to be the
    /// last is cross-checked by fetching the next one.
    pub page_size: usize,
    /// Upper bound on pages fetched by one traversal.
    pub max_pages: u32,
    /// Concurrent detail fetches while upgrading a page.
    pub detail_workers: usize,
    /// Concurrent image fetches per record.
    pub image_workers: usize,
    /// Smaller downloads are placeholder images and get rejected.
    pub min_image_bytes: usize,
    /// Applied on top of the session's retries, for pages that arrived but
    /// couldn't be parsed.
    pub parse_retry: RetryPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            page_size: 40,
            max_pages: 10,
            detail_workers: 2,
            image_workers: 4,
            min_image_bytes: 10_000,
            parse_retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1_000,
                ..RetryPolicy::default()
            },
        }
    }
}
