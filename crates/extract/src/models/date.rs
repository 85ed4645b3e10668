use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::consts;

/// A release date as the upstream printed it.
///
/// Normalized to a calendar date whenever the text contains one; otherwise
/// the raw text is kept and flagged instead of being dropped or guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "DateProxy", try_from = "DateProxy")]
pub enum ReleaseDate {
    Parsed(Date),
    Unparsed(String),
}

impl ReleaseDate {
    /// Returns `None` for blank text.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match parse_calendar_date(raw) {
            Some(date) => Self::Parsed(date),
            None => Self::Unparsed(raw.to_string()),
        })
    }

    pub fn date(&self) -> Option<Date> {
        match self {
            Self::Parsed(date) => Some(*date),
            Self::Unparsed(_) => None,
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Orders by recency. Anything unparsed ranks older than every real date,
    /// and unparsed values are all equal to each other.
    pub fn cmp_recency(a: Option<&Self>, b: Option<&Self>) -> Ordering {
        a.and_then(Self::date).cmp(&b.and_then(Self::date))
    }
}

fn parse_calendar_date(text: &str) -> Option<Date> {
    let captures = consts::DATE.captures(text)?;
    let year: i32 = captures[1].parse().ok()?;
    let month: u8 = captures[2].parse().ok()?;
    let day: u8 = captures[3].parse().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

impl Display for ReleaseDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Parsed(date) => write!(f, "{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Wire shape: `{"value": "2026-03-06", "normalized": true}`.
#[derive(Serialize, Deserialize)]
struct DateProxy {
    value: String,
    normalized: bool,
}

impl From<ReleaseDate> for DateProxy {
    fn from(date: ReleaseDate) -> Self {
        Self {
            value: date.to_string(),
            normalized: date.is_normalized(),
        }
    }
}

impl TryFrom<DateProxy> for ReleaseDate {
    type Error = String;
    fn try_from(proxy: DateProxy) -> Result<Self, Self::Error> {
        if !proxy.normalized {
            return Ok(Self::Unparsed(proxy.value));
        }
        parse_calendar_date(&proxy.value)
            .map(Self::Parsed)
            .ok_or_else(|| format!("invalid normalized date: {}", proxy.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::date;

    #[rstest]
    #[case("2026-03-06", "2026-03-06")]
    #[case(" 2026/3/6 ", "2026-03-06")]
    #[case("日期: 2026.03.06", "2026-03-06")]
    fn normalizes(#[case] raw: &str, #[case] expected: &str) {
        let parsed = ReleaseDate::parse(raw).unwrap();
        assert!(parsed.is_normalized());
        assert_eq!(parsed.to_string(), expected);
    }

    #[rstest]
    #[case("近期發行")]
    #[case("2026-13-40")]
    fn keeps_unparseable_text(#[case] raw: &str) {
        assert_eq!(ReleaseDate::parse(raw), Some(ReleaseDate::Unparsed(raw.to_string())));
    }

    #[test]
    fn blank_is_absent() {
        assert_eq!(ReleaseDate::parse("  "), None);
    }

    #[test]
    fn recency_ranks_unparsed_oldest() {
        let newer = ReleaseDate::Parsed(date!(2026 - 03 - 06));
        let older = ReleaseDate::Parsed(date!(2019 - 01 - 01));
        let unparsed = ReleaseDate::Unparsed("soon".to_string());
        assert_eq!(ReleaseDate::cmp_recency(Some(&newer), Some(&older)), Ordering::Greater);
        assert_eq!(ReleaseDate::cmp_recency(Some(&unparsed), Some(&older)), Ordering::Less);
        assert_eq!(ReleaseDate::cmp_recency(None, Some(&unparsed)), Ordering::Equal);
    }

    #[test]
    fn serializes_through_proxy() {
        let parsed = ReleaseDate::Parsed(date!(2026 - 03 - 06));
        let json = serde_json::to_string(&parsed).unwrap();
        assert_eq!(json, r#"{"value":"2026-03-06","normalized":true}"#);
        assert_eq!(serde_json::from_str::<ReleaseDate>(&json).unwrap(), parsed);
        let raw: ReleaseDate = serde_json::from_str(r#"{"value":"soon","normalized":false}"#).unwrap();
        assert_eq!(raw, ReleaseDate::Unparsed("soon".to_string()));
    }
}
