use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Placeholder the upstream renders instead of an item grid when a listing
// genuinely has no results.
selector!(EMPTY_MESSAGE, ".empty-message");

// Listing grid. The first selector is the current markup; the rest are older
// layouts that have been seen in the wild.
selector!(LISTING_ITEM, ".movie-list .item a.box");
selector!(LISTING_ITEM_GRID, ".grid .grid-item a.box");
selector!(LISTING_ITEM_LOOSE, "div.item a[href^='/v/']");
selector!(NEXT_PAGE, "nav.pagination a[rel='next']");
selector!(NEXT_PAGE_BUTTON, ".pagination .pagination-next[href]");
selector!(ITEM_CODE, ".video-title strong");
selector!(ITEM_TITLE, ".video-title");
selector!(ITEM_UID, ".uid");
selector!(ITEM_META, ".meta");
selector!(ITEM_SCORE_VALUE, ".score .value");
selector!(ITEM_SCORE, ".score, .rating");

// Detail page.
selector!(PANEL_BLOCK, ".movie-panel-info .panel-block");
selector!(PANEL_BLOCK_LOOSE, ".panel-block");
selector!(PANEL_LABEL, "strong");
selector!(PANEL_VALUE, ".value");
selector!(CLIPBOARD, ".copy-to-clipboard[data-clipboard-text]");
selector!(ANCHOR, "a");
selector!(TITLE_CURRENT, "h2.title .current-title");
selector!(TITLE_ORIGIN, "h2.title .origin-title");
selector!(TITLE_HEADING, "h2.title, h1.title");
selector!(TITLE_CODE, "h2.title strong");
selector!(DOCUMENT_TITLE, "head title");
selector!(TILE_LINK, ".tile-images a.tile-item[href]");
selector!(TILE_IMAGE, ".tile-images img, .preview-images img, .video-images img");
selector!(PREVIEW_SOURCE, "#preview-video source[src]");
selector!(VIDEO_SOURCE, "video source[src]");
selector!(VIDEO, "video[src], video[data-src]");
selector!(MAGNET_ITEM, "#magnets-content .item");
selector!(MAGNET_NAME, ".magnet-name .name");
selector!(MAGNET_META, ".magnet-name .meta, .meta");
selector!(MAGNET_TAG, ".tags .tag");
selector!(MAGNET_ANCHOR, "a[href^='magnet:']");
selector!(MAGNET_ANCHOR_NAME, ".name");
selector!(INFO_ACTOR, ".movie-panel-info a[href^='/actors/']");
selector!(INFO_TAG, ".movie-panel-info a[href*='/tags?']");
selector!(TAG_LINK, "a[href*='/tags?']");

// Actor search.
selector!(ACTOR_BOX, ".actor-box a[href^='/actors']");
selector!(ACTOR_ITEM, ".actors .item a[href^='/actors']");
selector!(ACTOR_NAME, "strong");

regex!(VIDEO_ID, r"/v/([A-Za-z0-9]+)(?:$|[?#/])");
regex!(ACTOR_ID, r"/actors/([A-Za-z0-9_-]+)(?:$|[?#/])");
// Codes are uppercase alphanumeric parts joined by `-` or `_`: `MIDA-583`,
// `T28-557`, `010124-001`, `1PON-010124_001`, `FC2-PPV-1234567`.
regex!(CODE_SHAPE, r"^[A-Z0-9]+(?:[-_][A-Z0-9]+)+$");
// Label and number run together, as people type them: `MIDA583`, `MIDA 583`.
regex!(CODE_COMPACT, r"^([A-Z0-9]*[A-Z]) ?(\d{2,})$");
regex!(DATE, r"(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})");
regex!(SCORE, r"(\d+(?:\.\d+)?)");
regex!(VOTES, r"(\d[\d,]*)\s*(?:人|users?|votes?)");
regex!(SIZE, r"(?i)(\d+(?:\.\d+)?)\s*([KMGT])i?B");
// Suffix the upstream appends to `<title>`.
regex!(TITLE_SUFFIX, r"\s*\|.*$");
selector!(BODY, "body");
