use std::fmt;

use jdb_taxonomy::Query;
use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::error::ErrorKind;

/// One item a batch operation couldn't complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Record id, image name, or whatever the batch was iterating over.
    pub identifier: String,
    pub error: ErrorKind,
}

impl Failure {
    pub fn new(identifier: impl Into<String>, error: ErrorKind) -> Self {
        Self {
            identifier: identifier.into(),
            error,
        }
    }
}

/// One page of results plus whatever went wrong producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// 1-based.
    pub page: u32,
    pub has_next: bool,
    pub items: Vec<T>,
    #[serde(default)]
    pub failures: Vec<Failure>,
}

impl<T> PageResult<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Which listing to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingSource {
    /// Tag-filtered listing; the page lives inside the query.
    Tags(Query),
    ActorWorks { actor_id: String, page: u32 },
    Search { keyword: String, page: u32 },
}

impl ListingSource {
    pub fn actor_works(actor_id: impl Into<String>) -> Self {
        Self::ActorWorks {
            actor_id: actor_id.into(),
            page: 1,
        }
    }

    pub fn search(keyword: impl Into<String>) -> Self {
        Self::Search {
            keyword: keyword.into(),
            page: 1,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Self::Tags(query) => query.page(),
            Self::ActorWorks { page, .. } | Self::Search { page, .. } => *page,
        }
    }

    /// Same listing pointed at another page; page 0 is treated as 1.
    pub fn at_page(&self, page: u32) -> Self {
        let page = page.max(1);
        match self {
            Self::Tags(query) => Self::Tags(query.with_page(page).unwrap_or_else(|_| query.clone())),
            Self::ActorWorks { actor_id, .. } => Self::ActorWorks {
                actor_id: actor_id.clone(),
                page,
            },
            Self::Search { keyword, .. } => Self::Search {
                keyword: keyword.clone(),
                page,
            },
        }
    }

    pub fn next_page(&self) -> Self {
        self.at_page(self.page().saturating_add(1))
    }

    /// Path and query parameters for the listing request.
    pub(crate) fn request(&self, site: &SiteConfig) -> (String, Vec<(String, String)>) {
        let paged = |mut params: Vec<(String, String)>, page: u32| {
            if page > 1 {
                params.push((site.query_style.page_param.clone(), page.to_string()));
            }
            params
        };
        match self {
            Self::Tags(query) => (site.tags_path.clone(), query.params()),
            Self::ActorWorks { actor_id, page } => (site.actor(actor_id), paged(Vec::new(), *page)),
            Self::Search { keyword, page } => (
                site.search_path.clone(),
                paged(vec![(site.keyword_param.clone(), keyword.clone())], *page),
            ),
        }
    }
}

impl fmt::Display for ListingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tags(query) => write!(f, "tags[{query}]"),
            Self::ActorWorks { actor_id, page } => write!(f, "actor {actor_id} page {page}"),
            Self::Search { keyword, page } => write!(f, "search '{keyword}' page {page}"),
        }
    }
}
