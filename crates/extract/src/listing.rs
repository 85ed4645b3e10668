//! Listing pages: tag filters, actor works and keyword search all share the
//! same item grid and pagination markup.

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::chain::{Chain, Source};
use crate::error::Result;
use crate::models::{Code, Rating, ReleaseDate, SummaryRecord, clean_text};
use crate::{absolutize, consts, document};

/// One parsed listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPage {
    /// Items in document order.
    pub items: Vec<SummaryRecord>,
    /// The page links to a following page.
    pub has_next: bool,
    /// The upstream explicitly said there is nothing here.
    pub empty_marker: bool,
}

/// Parses a listing page. `base` is the page URL; item links are resolved
/// against it.
///
/// A page is only allowed to be empty when the upstream says so. An item grid
/// that can't be found at all means the markup changed under us.
///
/// # Errors
/// - [`ErrorKind::Truncated`](crate::error::ErrorKind::Truncated) when the
///   body was cut short,
/// - [`ErrorKind::Drift`](crate::error::ErrorKind::Drift) when no item
///   selector matches and there's no empty-results marker.
#[instrument(skip(html, base), fields(html_size = html.len(), items))]
pub fn parse_listing(html: &str, base: &Url) -> Result<ListingPage> {
    let document = document::parse(html)?;
    let has_next = document.select(&consts::NEXT_PAGE).next().is_some()
        || document.select(&consts::NEXT_PAGE_BUTTON).next().is_some();
    let empty_marker = document.select(&consts::EMPTY_MESSAGE).next().is_some();

    let elements: Vec<ElementRef<'_>> = [&*consts::LISTING_ITEM, &*consts::LISTING_ITEM_GRID, &*consts::LISTING_ITEM_LOOSE]
        .into_iter()
        .map(|selector: &Selector| document.select(selector).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();
    if elements.is_empty() {
        if empty_marker {
            return Ok(ListingPage {
                items: Vec::new(),
                has_next,
                empty_marker,
            });
        }
        return Err(document::drift(&document, "listing items"));
    }

    let chains = ItemChains::new();
    let items: Vec<SummaryRecord> =
        elements.into_iter().filter_map(|element| chains.summary(&Item { element, base })).collect();
    if items.is_empty() {
        return Err(document::drift(&document, "listing item links"));
    }
    tracing::Span::current().record("items", items.len());
    Ok(ListingPage {
        items,
        has_next,
        empty_marker,
    })
}

struct Item<'a> {
    element: ElementRef<'a>,
    base: &'a Url,
}

impl Item<'_> {
    fn text(&self, selector: &Selector) -> Option<String> {
        self.element
            .select(selector)
            .next()
            .map(|found| clean_text(found.text().collect::<String>()))
            .filter(|text| !text.is_empty())
    }
}

impl Source for Item<'_> {
    fn fragment(&self) -> String {
        crate::excerpt::excerpt(&self.element.html())
    }
}

struct ItemChains<'a> {
    code: Chain<Item<'a>, Code>,
    title: Chain<Item<'a>, String>,
    rating: Chain<Item<'a>, Rating>,
}

impl<'a> ItemChains<'a> {
    fn new() -> Self {
        Self {
            code: Chain::<Item<'a>, Code>::new("code")
                .or("video-title strong", |item| item.text(&consts::ITEM_CODE).and_then(|text| Code::parse(&text)))
                .or("video-title text", |item| item.text(&consts::ITEM_TITLE).and_then(|text| Code::find_in(&text)))
                .or("uid", |item| item.text(&consts::ITEM_UID).and_then(|text| Code::parse(&text))),
            title: Chain::<Item<'a>, String>::new("title")
                .or("title attribute", |item| {
                    item.element.value().attr("title").map(clean_text).filter(|title| !title.is_empty())
                })
                .or("video-title text", |item| item.text(&consts::ITEM_TITLE)),
            rating: Chain::<Item<'a>, Rating>::new("rating")
                .or("score value", |item| item.text(&consts::ITEM_SCORE_VALUE).and_then(|text| Rating::parse(&text)))
                .or("score", |item| item.text(&consts::ITEM_SCORE).and_then(|text| Rating::parse(&text))),
        }
    }

    /// Items without a usable detail link are skipped; everything else about
    /// an item is optional at this level.
    fn summary(&self, item: &Item<'a>) -> Option<SummaryRecord> {
        let Some(href) = item.element.value().attr("href") else {
            tracing::warn!(fragment = item.fragment(), "skipping listing item without a link");
            return None;
        };
        let Some(id) = consts::VIDEO_ID.captures(href).map(|captures| captures[1].to_string()) else {
            tracing::warn!(href, "skipping listing item with an unrecognized link");
            return None;
        };
        let code = self.code.first(item);
        Some(SummaryRecord {
            title: self.title.first(item).or_else(|| code.as_ref().map(Code::to_string)).unwrap_or_default(),
            release_date: item.text(&consts::ITEM_META).and_then(|text| ReleaseDate::parse(&text)),
            rating: self.rating.first(item),
            url: absolutize(href, item.base).unwrap_or_else(|| href.to_string()),
            code,
            id,
        })
    }
}
