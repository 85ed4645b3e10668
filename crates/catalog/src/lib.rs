//! Catalog operations on top of an authenticated session: listing pages,
//! detail records, actor lookups, multi-page traversal and image downloads.

mod catalog;
mod config;
mod detail;
pub mod error;
mod listing;
mod page;
mod sink;

pub use crate::catalog::Catalog;
pub use crate::config::{CatalogConfig, SiteConfig};
pub use crate::detail::DetailExtractor;
pub use crate::listing::PageFetcher;
pub use crate::page::{Failure, ListingSource, PageResult};
pub use crate::sink::{ByteSink, ImageReport, MemorySink};
