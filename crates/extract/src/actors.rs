//! Actor search results (`/search?q=...&f=actor`).

use std::collections::HashSet;

use scraper::ElementRef;
use tracing::instrument;
use url::Url;

use crate::error::Result;
use crate::models::{ActorRef, clean_text};
use crate::{absolutize, consts, document};

/// Actor profiles on a search result page whose alias list contains `name`
/// exactly.
///
/// The upstream search is fuzzy and returns every actor whose name merely
/// resembles the query. Each result carries its aliases as a comma-separated
/// `title` attribute, and only an exact alias match is kept. The returned
/// name is the alias that matched.
///
/// # Errors
/// - [`ErrorKind::Truncated`](crate::error::ErrorKind::Truncated) when the
///   body was cut short,
/// - [`ErrorKind::Drift`](crate::error::ErrorKind::Drift) when the page has
///   neither actor results nor the empty-results marker.
#[instrument(skip(html, base), fields(html_size = html.len(), matches))]
pub fn parse_actor_search(html: &str, name: &str, base: &Url) -> Result<Vec<ActorRef>> {
    let document = document::parse(html)?;
    let mut boxes: Vec<ElementRef<'_>> = document.select(&consts::ACTOR_BOX).collect();
    if boxes.is_empty() {
        boxes = document.select(&consts::ACTOR_ITEM).collect();
    }
    if boxes.is_empty() {
        if document.select(&consts::EMPTY_MESSAGE).next().is_some() {
            return Ok(Vec::new());
        }
        return Err(document::drift(&document, "actor results"));
    }

    let needle = name.trim();
    let mut seen = HashSet::new();
    let mut actors = Vec::new();
    for anchor in boxes {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(id) = consts::ACTOR_ID.captures(href).map(|captures| captures[1].to_string()) else {
            continue;
        };
        let mut aliases: Vec<String> = anchor
            .value()
            .attr("title")
            .unwrap_or_default()
            .split([',', '，'])
            .map(clean_text)
            .collect();
        if let Some(strong) = anchor.select(&consts::ACTOR_NAME).next() {
            aliases.push(clean_text(strong.text().collect::<String>()));
        }
        let Some(matched) = aliases.into_iter().find(|alias| alias == needle) else {
            continue;
        };
        if seen.insert(id.clone()) {
            let url = absolutize(href, base).unwrap_or_else(|| href.to_string());
            actors.push(ActorRef { name: matched, id, url });
        }
    }
    tracing::Span::current().record("matches", actors.len());
    Ok(actors)
}
