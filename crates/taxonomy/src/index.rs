use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};

use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::TagCategory;
use crate::error::{ErrorKind, Result};

/// A single tag from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Axis this tag belongs to.
    pub category: TagCategory,
    /// Upstream tag id, unique within its category.
    pub id: u32,
    /// Display name (never empty).
    pub name: String,
}
impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}={} ({})", self.category, self.id, self.name)
    }
}

/// Summary row for [`TaxonomyIndex::categories`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub category: TagCategory,
    /// Display name as given by the snapshot.
    pub name: String,
    /// Number of valid tag ids in this category.
    pub cardinality: usize,
}

#[derive(Debug)]
struct Category {
    name: String,
    tags: BTreeMap<u32, Tag>,
}

/// Immutable lookup table over a static category → tag snapshot.
///
/// Loaded once and never mutated afterwards; share it behind an `Arc` and
/// read from as many tasks as you like.
#[derive(Debug)]
pub struct TaxonomyIndex {
    categories: BTreeMap<TagCategory, Category>,
    updated_at: Option<String>,
}

impl TaxonomyIndex {
    /// Parses and validates a JSON snapshot.
    ///
    /// Two layouts are accepted, the wrapped one written by the snapshot
    /// exporter and a bare `key → [tags]` mapping:
    ///
    /// ```json
    /// {"categories": {"c4": {"name": "體型", "tags": [{"id": 17, "name": "巨乳"}]}}}
    /// {"c4": [{"id": 17, "name": "巨乳"}]}
    /// ```
    ///
    /// Every [`TagCategory`] must be present with at least one tag. Keys that
    /// don't name a known category are skipped with a warning, so that a
    /// snapshot refreshed against a newer upstream still loads.
    ///
    /// # Errors
    /// [`ErrorKind::Snapshot`] for malformed JSON, a missing or empty
    /// category, an empty tag name, or a duplicated id.
    #[instrument(skip(snapshot), fields(snapshot_size = snapshot.as_ref().len()))]
    pub fn load(snapshot: impl AsRef<[u8]>) -> Result<Self> {
        let document: SnapshotDocument = serde_json::from_slice(snapshot.as_ref())
            .or_raise(|| ErrorKind::Snapshot("malformed snapshot JSON".to_string()))?;
        let (raw, updated_at) = match document {
            SnapshotDocument::Wrapped { categories, updated_at } => (categories, updated_at),
            SnapshotDocument::Bare(categories) => (categories, None),
        };
        let mut categories = BTreeMap::new();
        for (key, entry) in raw {
            let Some(category) = TagCategory::from_key(&key) else {
                tracing::warn!(key, "skipping unknown category in taxonomy snapshot");
                continue;
            };
            let (name, entries) = match entry {
                SnapshotCategory::Named { name, tags } => (name, tags),
                SnapshotCategory::Listed(tags) => (category.as_str().to_string(), tags),
            };
            if entries.is_empty() {
                exn::bail!(ErrorKind::Snapshot(format!("category {key} has no tags")));
            }
            let mut tags = BTreeMap::new();
            for entry in entries {
                let name = entry.name.trim().to_string();
                if name.is_empty() {
                    exn::bail!(ErrorKind::Snapshot(format!("tag {key}={} has an empty name", entry.id)));
                }
                let tag = Tag { category, id: entry.id, name };
                if tags.insert(entry.id, tag).is_some() {
                    exn::bail!(ErrorKind::Snapshot(format!("duplicate tag id {key}={}", entry.id)));
                }
            }
            categories.insert(category, Category { name: name.trim().to_string(), tags });
        }
        if let Some(missing) = TagCategory::ALL.iter().find(|category| !categories.contains_key(category)) {
            exn::bail!(ErrorKind::Snapshot(format!("category {missing} is missing")));
        }
        tracing::debug!(
            categories = categories.len(),
            tags = categories.values().map(|c| c.tags.len()).sum::<usize>(),
            "taxonomy snapshot loaded"
        );
        Ok(Self { categories, updated_at })
    }

    /// Returns the tag for `(category, id)`.
    ///
    /// # Errors
    /// [`ErrorKind::NotFound`] when the pair isn't in the snapshot.
    pub fn lookup(&self, category: TagCategory, id: u32) -> Result<&Tag> {
        self.categories
            .get(&category)
            .and_then(|c| c.tags.get(&id))
            .ok_or_raise(|| ErrorKind::NotFound { category, id })
    }

    /// `true` if `(category, id)` resolves.
    pub fn contains(&self, category: TagCategory, id: u32) -> bool {
        self.lookup(category, id).is_ok()
    }

    /// Case-insensitive substring search over tag names.
    ///
    /// Case folding is Unicode-aware, and names in scripts without case
    /// (CJK, kana) match as plain substrings. Results are ordered by category
    /// then by id. An empty needle matches nothing.
    pub fn search_by_name(&self, needle: &str) -> Vec<&Tag> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.categories
            .values()
            .flat_map(|category| category.tags.values())
            .filter(|tag| tag.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// All categories in canonical order, with their display name and the
    /// number of tags each one holds.
    pub fn categories(&self) -> Vec<CategoryInfo> {
        self.categories
            .iter()
            .map(|(category, entry)| CategoryInfo {
                category: *category,
                name: entry.name.clone(),
                cardinality: entry.tags.len(),
            })
            .collect()
    }

    /// Tags of one category, ordered by id.
    pub fn tags(&self, category: TagCategory) -> impl Iterator<Item = &Tag> {
        self.categories.get(&category).into_iter().flat_map(|c| c.tags.values())
    }

    /// When the snapshot was exported, if it says so.
    pub fn updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Wrapped {
        categories: HashMap<String, SnapshotCategory>,
        #[serde(default)]
        updated_at: Option<String>,
    },
    Bare(HashMap<String, SnapshotCategory>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotCategory {
    Named { name: String, tags: Vec<SnapshotTag> },
    Listed(Vec<SnapshotTag>),
}

#[derive(Deserialize)]
struct SnapshotTag {
    id: u32,
    name: String,
}
