use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::clean_text;
use crate::consts;

/// Community rating, e.g. `4.47分, 由1103人評價`.
///
/// The raw text is always kept; score and vote count are filled in when they
/// can be read out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub raw: String,
    /// Average score on the upstream's 0–5 scale.
    pub score: Option<f32>,
    pub votes: Option<u32>,
}

impl Rating {
    /// Returns `None` for blank text.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = clean_text(raw);
        if raw.is_empty() {
            return None;
        }
        let score = consts::SCORE
            .captures(&raw)
            .and_then(|captures| captures[1].parse::<f32>().ok())
            .filter(|score| (0.0..=5.0).contains(score));
        let votes = consts::VOTES
            .captures(&raw)
            .and_then(|captures| captures[1].replace(',', "").parse::<u32>().ok());
        Some(Self { raw, score, votes })
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\u{a0}\u{a0}4.47分, 由1103人評價", Some(4.47), Some(1103))]
    #[case("4.2, by 1,234 users", Some(4.2), Some(1234))]
    #[case("由87人評價", None, Some(87))]
    #[case("暫無評分", None, None)]
    fn parses_score_and_votes(#[case] raw: &str, #[case] score: Option<f32>, #[case] votes: Option<u32>) {
        let rating = Rating::parse(raw).unwrap();
        assert_eq!(rating.score, score);
        assert_eq!(rating.votes, votes);
        assert!(!rating.raw.is_empty());
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(Rating::parse(" \u{a0} "), None);
    }
}
