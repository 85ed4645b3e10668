use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts;
use crate::error::{Error, ErrorKind};

/// A catalog code in its normalized form: trimmed, uppercase, with hyphens
/// between its parts (`MIDA-583`, `1PON-010124-001`). A label typed straight
/// against its number gets a hyphen too (`mida583` is `MIDA-583`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    /// Normalizes a string that is nothing but a code.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_uppercase();
        if !raw.bytes().any(|byte| byte.is_ascii_digit()) {
            return None;
        }
        if consts::CODE_SHAPE.is_match(&raw) {
            return Some(Self(raw.replace('_', "-")));
        }
        let captures = consts::CODE_COMPACT.captures(&raw)?;
        Some(Self(format!("{}-{}", &captures[1], &captures[2])))
    }

    /// Finds the first code embedded in running text, such as a page title.
    /// Dates look like codes and are skipped.
    pub fn find_in(text: &str) -> Option<Self> {
        text.split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
            .filter(|word| !word.is_empty() && !consts::DATE.is_match(word))
            .find_map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code made safe to use as a single path segment.
    pub fn path_segment(&self) -> String {
        self.0
            .chars()
            .map(|c| if matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|') { '_' } else { c })
            .collect()
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for Code {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            exn::Exn::from(ErrorKind::ParseError {
                field: "code",
                value: s.to_string(),
            })
        })
    }
}

impl TryFrom<String> for Code {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a catalog code: {value}"))
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.0
    }
}
