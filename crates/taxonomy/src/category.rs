use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// A taxonomy axis.
///
/// The set is closed: the upstream tag page has exactly these categories, each
/// addressed by a `cN` query parameter. Declaration order is the canonical
/// serialization order for queries, so don't reorder variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TagCategory {
    /// 主題 (`c1`)
    Theme,
    /// 角色 (`c2`)
    Role,
    /// 服裝 (`c3`)
    Costume,
    /// 體型 (`c4`)
    Build,
    /// 行為 (`c5`)
    Behavior,
    /// 玩法 (`c6`)
    Play,
    /// 類別 (`c7`)
    Genre,
    /// 時長 (`c8`)
    Duration,
    /// 基本 (`c9`)
    Basic,
    /// 年份 (`c10`)
    Year,
}

impl TagCategory {
    /// Every category, in canonical order.
    pub const ALL: [TagCategory; 10] = [
        Self::Theme,
        Self::Role,
        Self::Costume,
        Self::Build,
        Self::Behavior,
        Self::Play,
        Self::Genre,
        Self::Duration,
        Self::Basic,
        Self::Year,
    ];

    /// Snapshot key, which doubles as the listing query parameter name.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Theme => "c1",
            Self::Role => "c2",
            Self::Costume => "c3",
            Self::Build => "c4",
            Self::Behavior => "c5",
            Self::Play => "c6",
            Self::Genre => "c7",
            Self::Duration => "c8",
            Self::Basic => "c9",
            Self::Year => "c10",
        }
    }

    /// Resolves a snapshot key (`"c4"`) back to its category.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key.trim())
    }

    /// English name of the axis, for logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Role => "role",
            Self::Costume => "costume",
            Self::Build => "build",
            Self::Behavior => "behavior",
            Self::Play => "play",
            Self::Genre => "genre",
            Self::Duration => "duration",
            Self::Basic => "basic",
            Self::Year => "year",
        }
    }
}

impl Display for TagCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.key())
    }
}

impl FromStr for TagCategory {
    type Err = Error;
    /// Accepts either the snapshot key (`c4`) or the English name (`build`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::from_key(&needle)
            .or_else(|| Self::ALL.into_iter().find(|category| category.as_str() == needle))
            .ok_or_else(|| exn::Exn::from(ErrorKind::Snapshot(format!("unknown category: {s}"))))
    }
}

impl From<TagCategory> for String {
    fn from(category: TagCategory) -> Self {
        category.key().to_string()
    }
}

impl TryFrom<String> for TagCategory {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_key(&value).ok_or_else(|| format!("unknown category key: {value}"))
    }
}
