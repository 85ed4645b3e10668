use serde::{Deserialize, Serialize};

use super::{ActorRef, Code, MagnetLink, Rating, ReleaseDate};

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Upstream record id (`YwG8Ve`), the path segment of the detail URL.
    pub id: String,
    /// Listings occasionally omit the code; the detail page never does.
    pub code: Option<Code>,
    pub title: String,
    pub release_date: Option<ReleaseDate>,
    pub rating: Option<Rating>,
    /// Absolute detail page URL.
    pub url: String,
}

/// Everything the detail page says about a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullRecord {
    pub id: String,
    pub code: Code,
    pub title: String,
    pub release_date: Option<ReleaseDate>,
    pub actors: Vec<ActorRef>,
    /// Genre tags, deduplicated, in the order the page lists them.
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub rating: Option<Rating>,
    /// Sample images, already upgraded to their high-resolution variant.
    pub images: Vec<String>,
    pub preview: Option<String>,
    /// Largest first.
    pub magnets: Vec<MagnetLink>,
    pub url: String,
}

impl FullRecord {
    /// Fills fields the detail page left empty from the listing entry it was
    /// reached through.
    pub fn merge_summary(&mut self, summary: &SummaryRecord) {
        if self.release_date.is_none() {
            self.release_date = summary.release_date.clone();
        }
        if self.rating.is_none() {
            self.rating = summary.rating.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_fills_gaps() {
        let summary = SummaryRecord {
            id: "YwG8Ve".to_string(),
            code: Code::parse("MIDA-583"),
            title: "listing title".to_string(),
            release_date: ReleaseDate::parse("2026-03-06"),
            rating: Rating::parse("4.47分, 由1103人評價"),
            url: "https://javdb.com/v/YwG8Ve".to_string(),
        };
        let mut full = FullRecord {
            id: "YwG8Ve".to_string(),
            code: Code::parse("MIDA-583").unwrap(),
            title: "detail title".to_string(),
            release_date: ReleaseDate::parse("2026-03-07"),
            actors: Vec::new(),
            tags: Vec::new(),
            series: None,
            rating: None,
            images: Vec::new(),
            preview: None,
            magnets: Vec::new(),
            url: "https://javdb.com/v/YwG8Ve".to_string(),
        };
        full.merge_summary(&summary);
        assert_eq!(full.title, "detail title");
        assert_eq!(full.release_date.unwrap().to_string(), "2026-03-07");
        assert_eq!(full.rating.unwrap().votes, Some(1103));
    }
}
