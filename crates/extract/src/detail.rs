//! Detail pages (`/v/{id}`).

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use tracing::instrument;
use url::Url;

use crate::chain::{Chain, Source};
use crate::error::Result;
use crate::models::{ActorRef, Code, FullRecord, MagnetLink, Rating, ReleaseDate, UNKNOWN_SIZE, clean_text};
use crate::excerpt::excerpt;
use crate::{absolutize, consts, document, upgrade_image_url};

const CODE_LABELS: &[&str] = &["番號", "ID"];
const DATE_LABELS: &[&str] = &["日期", "Released Date"];
const SERIES_LABELS: &[&str] = &["系列", "Series"];
const RATING_LABELS: &[&str] = &["評分", "Rating"];
const TAG_LABELS: &[&str] = &["類別", "Tags"];
const ACTOR_LABELS: &[&str] = &["演員", "Actor(s)"];
const GENDER_GLYPHS: &[&str] = &["♀", "♂"];

/// Parses a detail page into a [`FullRecord`]. `url` is where the page was
/// fetched from; relative links are resolved against it and it becomes the
/// record URL.
///
/// Code and title are required. Every other field is optional and simply
/// absent when no strategy finds it. Parsing is pure: the same markup always
/// yields an equal record.
///
/// # Errors
/// - [`ErrorKind::Truncated`](crate::error::ErrorKind::Truncated) when the
///   body was cut short,
/// - [`ErrorKind::MissingField`](crate::error::ErrorKind::MissingField) when
///   the code or title can't be found.
#[instrument(skip(html, url), fields(html_size = html.len()))]
pub fn parse_detail(html: &str, id: &str, url: &Url) -> Result<FullRecord> {
    let document = document::parse(html)?;
    let page = DetailPage::new(&document, url);
    let chains = DetailChains::new();
    let code = chains.code.required(&page)?;
    let title = chains.title.required(&page)?;
    Ok(FullRecord {
        id: id.to_string(),
        release_date: page.panel_text(DATE_LABELS).and_then(|text| ReleaseDate::parse(&text)),
        actors: chains.actors.first(&page).unwrap_or_default(),
        tags: chains.tags.first(&page).unwrap_or_default(),
        series: chains.series.first(&page),
        rating: page.panel_text(RATING_LABELS).and_then(|text| Rating::parse(&text)),
        images: chains.images.first(&page).unwrap_or_default(),
        preview: chains.preview.first(&page),
        magnets: magnets(chains.magnets.first(&page).unwrap_or_default(), &code),
        url: url.to_string(),
        code,
        title,
    })
}

struct DetailPage<'a> {
    document: &'a Html,
    base: &'a Url,
    panels: HashMap<String, ElementRef<'a>>,
}

/// Panel Internals
impl<'a> DetailPage<'a> {
    fn new(document: &'a Html, base: &'a Url) -> Self {
        let mut blocks: Vec<_> = document.select(&consts::PANEL_BLOCK).collect();
        if blocks.is_empty() {
            blocks = document.select(&consts::PANEL_BLOCK_LOOSE).collect();
        }
        let panels = blocks
            .into_iter()
            .filter_map(|block| {
                let label = block.select(&consts::PANEL_LABEL).next()?.text().collect::<String>();
                let label = label.trim().trim_end_matches([':', '：']).trim().to_string();
                (!label.is_empty()).then_some((label, block))
            })
            .collect();
        Self { document, base, panels }
    }

    fn panel(&self, labels: &[&str]) -> Option<ElementRef<'a>> {
        labels.iter().find_map(|label| self.panels.get(*label).copied())
    }

    /// Text of the panel's value, falling back to everything after the label.
    fn panel_text(&self, labels: &[&str]) -> Option<String> {
        let block = self.panel(labels)?;
        let text = match block.select(&consts::PANEL_VALUE).next() {
            Some(value) => value.text().collect::<String>(),
            None => block.text().skip(1).collect::<String>(),
        };
        Some(clean_text(text)).filter(|text| !text.is_empty())
    }

    fn panel_link_texts(&self, labels: &[&str]) -> Vec<String> {
        self.panel(labels).map(|block| link_texts(block.select(&consts::ANCHOR))).unwrap_or_default()
    }

    fn first_text(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .next()
            .map(|element| clean_text(element.text().collect::<String>()))
            .filter(|text| !text.is_empty())
    }

    fn attrs(&self, selector: &Selector, names: &[&str]) -> Vec<String> {
        self.document
            .select(selector)
            .filter_map(|element| names.iter().find_map(|name| element.value().attr(name)))
            .filter_map(|src| absolutize(src, self.base))
            .collect()
    }
}

/// People and Magnets
impl DetailPage<'_> {
    fn actor_links<'e>(&self, anchors: impl Iterator<Item = ElementRef<'e>>) -> Option<Vec<ActorRef>> {
        let mut seen = HashSet::new();
        let mut actors = Vec::new();
        for anchor in anchors {
            let name = clean_text(anchor.text().collect::<String>());
            if name.is_empty() || GENDER_GLYPHS.contains(&name.as_str()) {
                continue;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(id) = consts::ACTOR_ID.captures(href).map(|captures| captures[1].to_string()) else {
                continue;
            };
            if seen.insert(id.clone()) {
                let url = absolutize(href, self.base).unwrap_or_else(|| href.to_string());
                actors.push(ActorRef { name, id, url });
            }
        }
        (!actors.is_empty()).then_some(actors)
    }

    /// Magnets from the magnet list, in document order.
    fn listed_magnets(&self) -> Option<Vec<MagnetLink>> {
        let magnets: Vec<MagnetLink> = self
            .document
            .select(&consts::MAGNET_ITEM)
            .filter_map(|item| {
                let uri = item
                    .select(&consts::CLIPBOARD)
                    .filter_map(|button| button.value().attr("data-clipboard-text"))
                    .chain(item.select(&consts::MAGNET_ANCHOR).filter_map(|anchor| anchor.value().attr("href")))
                    .map(str::trim)
                    .find(|uri| uri.starts_with("magnet:"))?
                    .to_string();
                let name = inner_text(item, &consts::MAGNET_NAME).unwrap_or_default();
                let meta = item
                    .select(&consts::MAGNET_META)
                    .next()
                    .map(|meta| clean_text(meta.text().collect::<String>()))
                    .unwrap_or_default();
                let size = consts::SIZE.find(&meta).map(|found| found.as_str().replace(' ', ""));
                let size = size.unwrap_or_else(|| if meta.is_empty() { UNKNOWN_SIZE.to_string() } else { meta });
                Some(MagnetLink { name, size, uri, labels: magnet_labels(item) })
            })
            .collect();
        (!magnets.is_empty()).then_some(magnets)
    }

    /// Any `magnet:` link on the page. Name and size come from whatever
    /// surrounds the link.
    fn loose_magnets(&self) -> Option<Vec<MagnetLink>> {
        let mut seen = HashSet::new();
        let magnets: Vec<MagnetLink> = self
            .document
            .select(&consts::MAGNET_ANCHOR)
            .filter_map(|anchor| {
                let uri = anchor.value().attr("href")?.trim().to_string();
                if !seen.insert(uri.clone()) {
                    return None;
                }
                let around = anchor.parent().and_then(ElementRef::wrap).unwrap_or(anchor);
                let name = inner_text(anchor, &consts::MAGNET_ANCHOR_NAME)
                    .or_else(|| display_name(&uri))
                    .unwrap_or_default();
                let text = clean_text(around.text().collect::<String>());
                let size = consts::SIZE
                    .find(&text)
                    .map_or_else(|| UNKNOWN_SIZE.to_string(), |found| found.as_str().replace(' ', ""));
                Some(MagnetLink { name, size, uri, labels: magnet_labels(around) })
            })
            .collect();
        (!magnets.is_empty()).then_some(magnets)
    }
}

impl Source for DetailPage<'_> {
    fn fragment(&self) -> String {
        let body = self.document.select(&consts::BODY).next().map(|body| body.html());
        excerpt(&body.unwrap_or_else(|| self.document.html()))
    }
}

struct DetailChains<'a> {
    code: Chain<DetailPage<'a>, Code>,
    title: Chain<DetailPage<'a>, String>,
    series: Chain<DetailPage<'a>, String>,
    images: Chain<DetailPage<'a>, Vec<String>>,
    preview: Chain<DetailPage<'a>, String>,
    actors: Chain<DetailPage<'a>, Vec<ActorRef>>,
    tags: Chain<DetailPage<'a>, Vec<String>>,
    magnets: Chain<DetailPage<'a>, Vec<MagnetLink>>,
}

impl<'a> DetailChains<'a> {
    fn new() -> Self {
        Self {
            code: Chain::<DetailPage<'a>, Code>::new("code")
                .or("clipboard button", |page| {
                    let block = page.panel(CODE_LABELS)?;
                    let button = block.select(&consts::CLIPBOARD).next()?;
                    Code::parse(button.value().attr("data-clipboard-text")?)
                })
                .or("panel value", |page| page.panel_text(CODE_LABELS).and_then(|text| Code::parse(&text)))
                .or("heading", |page| page.first_text(&consts::TITLE_CODE).and_then(|text| Code::find_in(&text)))
                .or("document title", |page| {
                    page.first_text(&consts::DOCUMENT_TITLE).and_then(|text| Code::find_in(&text))
                }),
            title: Chain::<DetailPage<'a>, String>::new("title")
                .or("current title", |page| page.first_text(&consts::TITLE_CURRENT))
                .or("origin title", |page| page.first_text(&consts::TITLE_ORIGIN))
                .or("heading", |page| page.first_text(&consts::TITLE_HEADING))
                .or("document title", |page| {
                    let text = page.first_text(&consts::DOCUMENT_TITLE)?;
                    Some(consts::TITLE_SUFFIX.replace(&text, "").trim().to_string()).filter(|title| !title.is_empty())
                }),
            series: Chain::<DetailPage<'a>, String>::new("series")
                .or("panel link", |page| page.panel_link_texts(SERIES_LABELS).into_iter().next())
                .or("panel value", |page| page.panel_text(SERIES_LABELS)),
            images: Chain::<DetailPage<'a>, Vec<String>>::new("images")
                .or("tile links", |page| upgraded(page.attrs(&consts::TILE_LINK, &["href"])))
                .or("tile images", |page| upgraded(page.attrs(&consts::TILE_IMAGE, &["data-src", "src"]))),
            preview: Chain::<DetailPage<'a>, String>::new("preview")
                .or("preview source", |page| page.attrs(&consts::PREVIEW_SOURCE, &["src"]).into_iter().next())
                .or("video source", |page| page.attrs(&consts::VIDEO_SOURCE, &["src"]).into_iter().next())
                .or("video", |page| page.attrs(&consts::VIDEO, &["src", "data-src"]).into_iter().next()),
            actors: Chain::<DetailPage<'a>, Vec<ActorRef>>::new("actors")
                .or("actor panel", |page| {
                    let block = page.panel(ACTOR_LABELS)?;
                    page.actor_links(block.select(&consts::ANCHOR))
                })
                .or("info actor links", |page| page.actor_links(page.document.select(&consts::INFO_ACTOR))),
            tags: Chain::<DetailPage<'a>, Vec<String>>::new("tags")
                .or("tag panel", |page| non_empty(page.panel_link_texts(TAG_LABELS)))
                .or("info tag links", |page| non_empty(link_texts(page.document.select(&consts::INFO_TAG))))
                .or("tag links", |page| non_empty(link_texts(page.document.select(&consts::TAG_LINK)))),
            magnets: Chain::<DetailPage<'a>, Vec<MagnetLink>>::new("magnets")
                .or("magnet list", DetailPage::listed_magnets)
                .or("magnet links", DetailPage::loose_magnets),
        }
    }
}

/// Unnamed magnets take the record's code, then the largest come first.
/// Equal or unknown sizes keep document order.
fn magnets(mut magnets: Vec<MagnetLink>, code: &Code) -> Vec<MagnetLink> {
    for magnet in magnets.iter_mut().filter(|magnet| magnet.name.is_empty()) {
        magnet.name = code.to_string();
    }
    magnets.sort_by(|a, b| b.size_mb().unwrap_or(0.0).total_cmp(&a.size_mb().unwrap_or(0.0)));
    magnets
}

fn magnet_labels(element: ElementRef<'_>) -> Vec<String> {
    element
        .select(&consts::MAGNET_TAG)
        .map(|tag| clean_text(tag.text().collect::<String>()))
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// The `dn` parameter of a magnet URI.
fn display_name(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let name = url.query_pairs().find(|(key, _)| key == "dn")?.1;
    Some(clean_text(name.into_owned())).filter(|name| !name.is_empty())
}

fn inner_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|found| clean_text(found.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

/// Distinct, non-empty anchor texts in document order.
fn link_texts<'e>(anchors: impl Iterator<Item = ElementRef<'e>>) -> Vec<String> {
    let mut seen = HashSet::new();
    anchors
        .map(|anchor| clean_text(anchor.text().collect::<String>()))
        .filter(|text| !text.is_empty() && seen.insert(text.clone()))
        .collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// High-resolution variants, deduplicated in order. `None` when empty so the
/// next strategy gets a go.
fn upgraded(urls: Vec<String>) -> Option<Vec<String>> {
    let mut seen = HashSet::new();
    let images: Vec<String> =
        urls.iter().map(|url| upgrade_image_url(url)).filter(|url| seen.insert(url.clone())).collect();
    (!images.is_empty()).then_some(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::{fixture, rstest};

    const DETAIL: &str = include_str!("../fixtures/detail_YwG8Ve.html");

    #[fixture]
    fn url() -> Url {
        Url::parse("https://javdb.com/v/YwG8Ve").unwrap()
    }

    #[fixture]
    fn record(url: Url) -> FullRecord {
        parse_detail(DETAIL, "YwG8Ve", &url).unwrap()
    }

    #[rstest]
    fn extracts_identity(record: FullRecord) {
        assert_eq!(record.id, "YwG8Ve");
        assert_eq!(record.code.as_str(), "MIDA-583");
        assert!(record.title.contains("エッチ覚醒4本番"));
        assert_eq!(record.url, "https://javdb.com/v/YwG8Ve");
        assert_eq!(record.release_date.unwrap().to_string(), "2026-03-06");
        assert_eq!(record.series.as_deref(), Some("エッチ覚醒"));
        assert_eq!(record.rating.unwrap().votes, Some(1103));
    }

    #[rstest]
    fn extracts_people_and_tags(record: FullRecord) {
        let names: Vec<_> = record.actors.iter().map(|actor| actor.name.as_str()).collect();
        assert_eq!(names, vec!["井上もも", "しみけん"]);
        assert_eq!(record.actors[0].id, "0R1n3");
        assert_eq!(record.actors[0].url, "https://javdb.com/actors/0R1n3");
        // The page lists 美少女電影 twice.
        assert_eq!(record.tags, vec!["美少女電影", "單體作品", "巨乳", "數位馬賽克"]);
    }

    #[rstest]
    fn extracts_media(record: FullRecord) {
        assert_eq!(
            record.images,
            vec![
                "https://c0.jdbstatic.com/samples/yw/YwG8Ve_l_0.jpg",
                "https://c0.jdbstatic.com/samples/yw/YwG8Ve_l_1.jpg",
                "https://c0.jdbstatic.com/samples/yw/YwG8Ve_l_2.jpg",
            ]
        );
        assert_eq!(record.preview.as_deref(), Some("https://cc3001.dmm.co.jp/litevideo/mida00583_dmb_w.mp4"));
    }

    #[rstest]
    fn extracts_magnets_largest_first(record: FullRecord) {
        let magnets = &record.magnets;
        assert_eq!(magnets.len(), 3);
        assert_eq!(magnets[0].name, "MIDA-583");
        assert_eq!(magnets[0].size, "5.27GB");
        assert_eq!(magnets[0].labels, vec!["高清", "字幕"]);
        assert!(magnets[0].uri.starts_with("magnet:?xt=urn:btih:"));
        assert_eq!(magnets[1].size, "1.98GB");
        // No meta at all: size is reported as unknown and sorts last.
        assert_eq!(magnets[2].size, UNKNOWN_SIZE);
        assert_eq!(magnets[2].name, "MIDA-583-C");
    }

    #[rstest]
    fn parsing_is_idempotent(url: Url) {
        assert_eq!(parse_detail(DETAIL, "YwG8Ve", &url).unwrap(), parse_detail(DETAIL, "YwG8Ve", &url).unwrap());
    }

    #[rstest]
    fn falls_back_when_primary_markup_is_gone(url: Url) {
        let html = r#"<html><head><title>ABP-123 Fallback Title | JavDB 成人影片數據庫</title></head>
            <body><div class="tile-images"><img src="//c0.jdbstatic.com/samples/ab/x_s_0.jpg"></div>
            <video src="//cc3001.dmm.co.jp/x.mp4"></video></body></html>"#;
        let record = parse_detail(html, "x", &url).unwrap();
        assert_eq!(record.code.as_str(), "ABP-123");
        assert_eq!(record.title, "ABP-123 Fallback Title");
        assert_eq!(record.images, vec!["https://c0.jdbstatic.com/samples/ab/x_l_0.jpg"]);
        assert_eq!(record.preview.as_deref(), Some("https://cc3001.dmm.co.jp/x.mp4"));
        assert!(record.actors.is_empty() && record.tags.is_empty() && record.magnets.is_empty());
        assert_eq!(record.release_date, None);
    }

    #[rstest]
    fn missing_code_is_reported(url: Url) {
        let html = "<html><body><h2 class=\"title\"><span class=\"current-title\">No code here</span></h2></body></html>";
        let err = parse_detail(html, "x", &url).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField { field: "code", fragment } if fragment.contains("No code here")));
    }

    #[rstest]
    #[case("T28-557", "T28-557")]
    #[case("010124-001", "010124-001")]
    #[case("1pon-010124_001", "1PON-010124-001")]
    fn keeps_the_shape_of_the_copy_button_code(url: Url, #[case] raw: &str, #[case] expected: &str) {
        let html = format!(
            r#"<html><body><h2 class="title"><strong>{raw}</strong> <span class="current-title">Title</span></h2>
            <div class="movie-panel-info"><div class="panel-block"><strong>番號:</strong>
            <span class="value">{raw}</span><a class="copy-to-clipboard" data-clipboard-text="{raw}"></a></div></div>
            </body></html>"#
        );
        assert_eq!(parse_detail(&html, "x", &url).unwrap().code.as_str(), expected);
    }

    #[rstest]
    fn finds_uncommon_codes_in_the_document_title(url: Url) {
        let html = "<html><head><title>1PON-010124_001 New Year | JavDB 成人影片數據庫</title></head><body></body></html>";
        let record = parse_detail(html, "x", &url).unwrap();
        assert_eq!(record.code.as_str(), "1PON-010124-001");
        assert_eq!(record.title, "1PON-010124_001 New Year");
    }

    #[rstest]
    fn magnets_fall_back_to_any_magnet_link(url: Url) {
        let html = r#"<html><head><title>ABP-123 Title | JavDB</title></head><body>
            <div class="magnet-links">
              <div class="item"><a href="magnet:?xt=urn:btih:aaa&amp;dn=ABP-123-C">download</a> 1.5 GB</div>
              <div class="item"><a href="magnet:?xt=urn:btih:bbb"><span class="name">ABP-123 HD</span> 4.2 GB</a>
                <span class="tags"><span class="tag">高清</span></span></div>
              <div class="item"><a href="magnet:?xt=urn:btih:ccc">mirror</a></div>
              <div class="item"><a href="magnet:?xt=urn:btih:aaa&amp;dn=ABP-123-C">again</a></div>
            </div></body></html>"#;
        let magnets = parse_detail(html, "x", &url).unwrap().magnets;
        let summary: Vec<_> = magnets.iter().map(|magnet| (magnet.name.as_str(), magnet.size.as_str())).collect();
        assert_eq!(summary, vec![("ABP-123 HD", "4.2GB"), ("ABP-123-C", "1.5GB"), ("ABP-123", UNKNOWN_SIZE)]);
        assert_eq!(magnets[0].labels, vec!["高清"]);
        assert_eq!(magnets[1].uri, "magnet:?xt=urn:btih:aaa&dn=ABP-123-C");
    }

    #[rstest]
    fn actors_fall_back_to_info_panel_links(url: Url) {
        let html = r#"<html><head><title>ABP-123 Title | JavDB</title></head><body>
            <div class="movie-panel-info"><div class="panel-block"><strong>Cast:</strong><span class="value">
              <a href="/actors/AbC1">Airi</a><strong class="symbol female">♀</strong>
              <a href="/actors/AbC1">Airi</a><a href="/actors/Xy9">Ken</a>
            </span></div></div></body></html>"#;
        let actors = parse_detail(html, "x", &url).unwrap().actors;
        let ids: Vec<_> = actors.iter().map(|actor| (actor.id.as_str(), actor.name.as_str())).collect();
        assert_eq!(ids, vec![("AbC1", "Airi"), ("Xy9", "Ken")]);
        assert_eq!(actors[1].url, "https://javdb.com/actors/Xy9");
    }

    #[rstest]
    #[case::info_panel(
        r#"<div class="movie-panel-info"><div class="panel-block"><strong>Genre:</strong>
        <a href="/tags?c7=28">巨乳</a><a href="/tags?c4=17">美少女</a></div></div>"#
    )]
    #[case::anywhere(r#"<section><a href="/tags?c7=28">巨乳</a> <a href="/tags?c4=17">美少女</a></section>"#)]
    fn tags_fall_back_to_tag_links(url: Url, #[case] body: &str) {
        let html = format!("<html><head><title>ABP-123 Title | JavDB</title></head><body>{body}</body></html>");
        assert_eq!(parse_detail(&html, "x", &url).unwrap().tags, vec!["巨乳", "美少女"]);
    }
}
