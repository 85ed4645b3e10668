use std::sync::Arc;

use async_stream::stream;
use exn::OptionExt;
use futures::{Stream, StreamExt};
use jdb_extract::image_key;
use jdb_extract::models::{ActorRef, Code, FullRecord, ReleaseDate, SummaryRecord};
use jdb_session::{Cancel, Method, SessionManager, Transport};
use jdb_taxonomy::{Query, QueryBuilder, TagCategory, TaxonomyIndex};
use tracing::{Span, instrument};

use crate::config::CatalogConfig;
use crate::detail::DetailExtractor;
use crate::error::{ErrorKind, Result};
use crate::listing::PageFetcher;
use crate::page::{Failure, ListingSource, PageResult};
use crate::sink::{ByteSink, ImageReport};

/// Entry point for every catalog operation.
///
/// Holds one shared [`SessionManager`], the taxonomy snapshot and the
/// fetchers built on top of them. Cheap to share behind an [`Arc`]; every
/// method takes `&self`.
pub struct Catalog<T: Transport> {
    session: Arc<SessionManager<T>>,
    taxonomy: Arc<TaxonomyIndex>,
    config: Arc<CatalogConfig>,
    pages: PageFetcher<T>,
    details: DetailExtractor<T>,
    sink: Option<Arc<dyn ByteSink>>,
}

impl<T: Transport> Catalog<T> {
    pub fn new(session: Arc<SessionManager<T>>, taxonomy: Arc<TaxonomyIndex>, config: CatalogConfig) -> Self {
        let config = Arc::new(config);
        Self {
            pages: PageFetcher::new(Arc::clone(&session), Arc::clone(&config)),
            details: DetailExtractor::new(Arc::clone(&session), Arc::clone(&config)),
            session,
            taxonomy,
            config,
            sink: None,
        }
    }

    /// Where [`materialize_images`](Self::materialize_images) writes to.
    pub fn with_sink(mut self, sink: Arc<dyn ByteSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    pub fn taxonomy(&self) -> &TaxonomyIndex {
        &self.taxonomy
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn pages(&self) -> &PageFetcher<T> {
        &self.pages
    }

    pub fn details(&self) -> &DetailExtractor<T> {
        &self.details
    }

    /// Full record for upstream id `id`, optionally downloading its sample
    /// images to the sink. Image failures are logged, not returned; use
    /// [`materialize_images`](Self::materialize_images) for the report.
    #[instrument(skip(self, cancel))]
    pub async fn get_detail(&self, id: &str, materialize: bool, cancel: &Cancel) -> Result<FullRecord> {
        let record = self.details.fetch_detail(id, cancel).await?;
        if materialize {
            let report = self.materialize_images(&record, cancel).await?;
            for failure in &report.failures {
                tracing::warn!(image = %failure.identifier, error = %failure.error, "image not saved");
            }
        }
        Ok(record)
    }

    /// Looks a record up by its catalog code (`MIDA-583`, `mida583`, ...).
    ///
    /// The site's search is fuzzy, so only results whose code normalizes to
    /// the same value are considered, and of those the most recent release
    /// wins (re-releases share a code). Undated results rank oldest; ties go
    /// to whichever the site listed first.
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidQuery`] when `code` doesn't look like a code,
    /// - [`ErrorKind::NotFound`] when no result matches it exactly.
    #[instrument(skip(self, cancel), fields(id))]
    pub async fn get_by_code(&self, code: &str, cancel: &Cancel) -> Result<FullRecord> {
        let wanted = Code::parse(code).ok_or_raise(|| ErrorKind::InvalidQuery(format!("not a catalog code: {code}")))?;
        let results = self.pages.fetch_listing(&ListingSource::search(wanted.as_str()), cancel).await?;
        let best = results
            .items
            .iter()
            .filter(|item| item.code.as_ref() == Some(&wanted))
            .reduce(|best, next| {
                if ReleaseDate::cmp_recency(next.release_date.as_ref(), best.release_date.as_ref()).is_gt() {
                    next
                } else {
                    best
                }
            })
            .ok_or_raise(|| ErrorKind::NotFound(format!("no record with code {wanted}")))?;
        Span::current().record("id", best.id.as_str());
        self.get_detail(&best.id, false, cancel).await
    }

    /// Actors whose name or alias is exactly `name`.
    pub async fn search_actor(&self, name: &str, cancel: &Cancel) -> Result<Vec<ActorRef>> {
        self.pages.fetch_actor_search(name, cancel).await
    }

    /// One page of an actor's works.
    pub async fn search_actor_works(
        &self,
        actor_id: &str,
        page: u32,
        cancel: &Cancel,
    ) -> Result<PageResult<SummaryRecord>> {
        let source = ListingSource::ActorWorks {
            actor_id: non_empty(actor_id, "actor id")?,
            page: valid_page(page)?,
        };
        self.pages.fetch_listing(&source, cancel).await
    }

    /// [`search_actor_works`](Self::search_actor_works), upgraded to full
    /// records.
    pub async fn search_actor_works_full(
        &self,
        actor_id: &str,
        page: u32,
        materialize: bool,
        cancel: &Cancel,
    ) -> Result<PageResult<FullRecord>> {
        let summaries = self.search_actor_works(actor_id, page, cancel).await?;
        self.upgrade(summaries, materialize, cancel).await
    }

    /// Validates a tag selection against the taxonomy.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidQuery`] for unknown tags, an empty selection or
    /// page 0.
    pub fn build_query<S, I>(&self, selection: S, page: u32) -> Result<Query>
    where
        S: IntoIterator<Item = (TagCategory, I)>,
        I: IntoIterator<Item = u32>,
    {
        QueryBuilder::new(&self.taxonomy)
            .with_style(self.config.site.query_style.clone())
            .build(selection, page)
            .map_err(ErrorKind::taxonomy)
    }

    /// One page of the listing filtered by a tag selection. Several
    /// categories narrow the results together.
    pub async fn search_by_tags<S, I>(&self, selection: S, page: u32, cancel: &Cancel) -> Result<PageResult<SummaryRecord>>
    where
        S: IntoIterator<Item = (TagCategory, I)>,
        I: IntoIterator<Item = u32>,
    {
        let query = self.build_query(selection, page)?;
        self.pages.fetch_listing(&ListingSource::Tags(query), cancel).await
    }

    /// [`search_by_tags`](Self::search_by_tags), upgraded to full records.
    pub async fn search_by_tags_full<S, I>(
        &self,
        selection: S,
        page: u32,
        materialize: bool,
        cancel: &Cancel,
    ) -> Result<PageResult<FullRecord>>
    where
        S: IntoIterator<Item = (TagCategory, I)>,
        I: IntoIterator<Item = u32>,
    {
        let summaries = self.search_by_tags(selection, page, cancel).await?;
        self.upgrade(summaries, materialize, cancel).await
    }

    /// One page of a free-text search.
    pub async fn search_keyword(&self, keyword: &str, page: u32, cancel: &Cancel) -> Result<PageResult<SummaryRecord>> {
        let source = ListingSource::Search {
            keyword: non_empty(keyword, "keyword")?,
            page: valid_page(page)?,
        };
        self.pages.fetch_listing(&source, cancel).await
    }

    /// Fetches the detail page of every item on `page`, a few at a time,
    /// keeping listing order. Items whose detail fetch fails are left out and
    /// recorded in `failures`; release date and rating missing from a detail
    /// page are taken from the listing entry.
    ///
    /// # Errors
    /// Only [`ErrorKind::Cancelled`] (and sink configuration errors when
    /// `materialize` is set); everything else is per-item.
    #[instrument(skip_all, fields(page = page.page, items = page.items.len(), failed))]
    pub async fn upgrade(
        &self,
        page: PageResult<SummaryRecord>,
        materialize: bool,
        cancel: &Cancel,
    ) -> Result<PageResult<FullRecord>> {
        let PageResult {
            page: number,
            has_next,
            items,
            mut failures,
        } = page;
        let fetched: Vec<(SummaryRecord, Result<FullRecord>)> = futures::stream::iter(items)
            .map(|summary| async move {
                let detail = self.details.fetch_detail(&summary.id, cancel).await;
                (summary, detail)
            })
            .buffered(self.config.detail_workers.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(fetched.len());
        for (summary, detail) in fetched {
            match detail {
                Ok(mut record) => {
                    record.merge_summary(&summary);
                    records.push(record);
                },
                Err(err) if *err == ErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    tracing::warn!(id = %summary.id, error = %*err, "detail fetch failed");
                    failures.push(Failure::new(summary.id, (*err).clone()));
                },
            }
        }
        if materialize {
            for record in &records {
                let report = self.materialize_images(record, cancel).await?;
                failures.extend(report.failures);
            }
        }
        if cancel.fired() {
            exn::bail!(ErrorKind::Cancelled);
        }
        Span::current().record("failed", failures.len());
        Ok(PageResult {
            page: number,
            has_next,
            items: records,
            failures,
        })
    }

    /// Walks a listing from its current page onwards, one page per poll.
    ///
    /// Stops after a page without a next link, after `max_pages` fetches, or
    /// after the first error (which is yielded). A last page that is full
    /// is not trusted on its own: the following page is fetched too, and the
    /// walk carries on if that one has items.
    pub fn traverse<'a>(
        &'a self,
        source: ListingSource,
        cancel: &'a Cancel,
    ) -> impl Stream<Item = Result<PageResult<SummaryRecord>>> + 'a {
        stream! {
            let page_size = self.config.page_size;
            let mut source = source;
            let mut probing = false;
            for _ in 0..self.config.max_pages {
                let page = match self.pages.fetch_listing(&source, cancel).await {
                    Ok(page) => page,
                    Err(err) if probing && matches!(*err, ErrorKind::NotFound(_)) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    },
                };
                if probing {
                    if page.is_empty() {
                        tracing::debug!(page = page.page, "page after the last one is empty");
                        break;
                    }
                    tracing::warn!(page = page.page, "upstream hid the next-page link on a full page");
                }
                let has_next = page.has_next;
                let full = page.items.len() >= page_size;
                yield Ok(page);
                if !has_next && !full {
                    break;
                }
                probing = !has_next;
                source = source.next_page();
            }
        }
    }

    /// Downloads a record's sample images into the sink as
    /// `{CODE}/{index:05}.{ext}`. Downloads smaller than `min_image_bytes`
    /// are placeholders and count as failures.
    ///
    /// # Errors
    /// [`ErrorKind::Sink`] when no sink is configured and
    /// [`ErrorKind::Cancelled`]; per-image failures are in the report.
    #[instrument(skip_all, fields(code = %record.code, images = record.images.len()))]
    pub async fn materialize_images(&self, record: &FullRecord, cancel: &Cancel) -> Result<ImageReport> {
        let sink = self
            .sink
            .as_deref()
            .ok_or_raise(|| ErrorKind::Sink("no byte sink configured".to_string()))?;
        let outcomes: Vec<(String, Result<()>)> = futures::stream::iter(record.images.iter().enumerate())
            .map(|(index, url)| async move {
                let name = image_key(&record.code, index + 1, url);
                let outcome = self.store_image(sink, &name, url, cancel).await;
                (name, outcome)
            })
            .buffer_unordered(self.config.image_workers.max(1))
            .collect()
            .await;

        let mut report = ImageReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.saved.push(name),
                Err(err) if *err == ErrorKind::Cancelled => return Err(err),
                Err(err) => report.failures.push(Failure::new(name, (*err).clone())),
            }
        }
        report.saved.sort();
        report.failures.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(report)
    }

    async fn store_image(&self, sink: &dyn ByteSink, name: &str, url: &str, cancel: &Cancel) -> Result<()> {
        let no_params: [(String, String); 0] = [];
        let response = self
            .session
            .request(Method::Get, url, no_params, cancel)
            .await
            .map_err(ErrorKind::session)?;
        if response.body.len() < self.config.min_image_bytes {
            exn::bail!(ErrorKind::Rejected(format!("{url} is only {} bytes, a placeholder", response.body.len())));
        }
        sink.put(name, &response.body).await
    }
}

fn non_empty(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        exn::bail!(ErrorKind::InvalidQuery(format!("empty {what}")));
    }
    Ok(value.to_string())
}

fn valid_page(page: u32) -> Result<u32> {
    if page == 0 {
        exn::bail!(ErrorKind::InvalidQuery("pages start at 1".to_string()));
    }
    Ok(page)
}
