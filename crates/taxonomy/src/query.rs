use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{TagCategory, TaxonomyIndex};

/// How a [`Query`] is rendered into listing parameters.
///
/// The parameter names belong to the upstream, so they're configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStyle {
    /// Joins several ids selected under the same category.
    pub id_separator: String,
    /// Name of the page cursor parameter.
    pub page_param: String,
}
impl Default for QueryStyle {
    fn default() -> Self {
        Self {
            id_separator: ",".to_string(),
            page_param: "page".to_string(),
        }
    }
}

/// A validated, canonically ordered tag filter plus a page cursor.
///
/// Two queries built from the same logical selection compare equal, render
/// to the same string and share a [`signature`](Self::signature), whatever
/// order the selection was supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    selection: BTreeMap<TagCategory, Vec<u32>>,
    page: u32,
    #[serde(skip)]
    style: QueryStyle,
}

impl Query {
    /// Page cursor, starting at 1.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// The same selection, pointed at another page.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidPage`] for page 0.
    pub fn with_page(&self, page: u32) -> Result<Self> {
        if page == 0 {
            exn::bail!(ErrorKind::InvalidPage(page));
        }
        Ok(Self { page, ..self.clone() })
    }

    /// The same selection, one page further.
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    /// Selected ids per category, in canonical category order.
    pub fn selection(&self) -> &BTreeMap<TagCategory, Vec<u32>> {
        &self.selection
    }

    /// Ordered `(name, value)` pairs for the listing request. The page
    /// parameter is left out for the first page, as the upstream does in its
    /// own links.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .selection
            .iter()
            .map(|(category, ids)| {
                let ids = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(&self.style.id_separator);
                (category.key().to_string(), ids)
            })
            .collect();
        if self.page > 1 {
            params.push((self.style.page_param.clone(), self.page.to_string()));
        }
        params
    }

    /// Stable digest of the serialized query, usable as a cache key.
    pub fn signature(&self) -> String {
        blake3::hash(self.to_string().as_bytes()).to_hex().to_string()
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let rendered = self
            .params()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        write!(f, "{rendered}")
    }
}

/// Turns a category → ids mapping into a validated [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    index: &'a TaxonomyIndex,
    style: QueryStyle,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(index: &'a TaxonomyIndex) -> Self {
        Self {
            index,
            style: QueryStyle::default(),
        }
    }

    pub fn with_style(mut self, style: QueryStyle) -> Self {
        self.style = style;
        self
    }

    /// Validates a selection and fixes its order.
    ///
    /// Ids under one category are kept in the order given; the upstream
    /// receives them as its own combinator. A category listed more than once
    /// has its ids appended. Categories with no ids add no constraint.
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidTag`] when an id isn't in the snapshot for its
    ///   category,
    /// - [`ErrorKind::EmptySelection`] when no id is selected at all,
    /// - [`ErrorKind::InvalidPage`] for page 0.
    #[instrument(level = "debug", skip(self, selection))]
    pub fn build<S, I>(&self, selection: S, page: u32) -> Result<Query>
    where
        S: IntoIterator<Item = (TagCategory, I)>,
        I: IntoIterator<Item = u32>,
    {
        if page == 0 {
            exn::bail!(ErrorKind::InvalidPage(page));
        }
        let mut canonical: BTreeMap<TagCategory, Vec<u32>> = BTreeMap::new();
        for (category, ids) in selection {
            for id in ids {
                if !self.index.contains(category, id) {
                    exn::bail!(ErrorKind::InvalidTag { category, id });
                }
                canonical.entry(category).or_default().push(id);
            }
        }
        if canonical.is_empty() {
            exn::bail!(ErrorKind::EmptySelection);
        }
        Ok(Query {
            selection: canonical,
            page,
            style: self.style.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::collections::HashMap;

    #[fixture]
    fn index() -> TaxonomyIndex {
        TaxonomyIndex::load(include_str!("../fixtures/snapshot.json")).unwrap()
    }

    #[rstest]
    fn serializes_in_canonical_order(index: TaxonomyIndex) {
        let query = QueryBuilder::new(&index)
            .build([(TagCategory::Behavior, vec![18]), (TagCategory::Theme, vec![4]), (TagCategory::Build, vec![17])], 1)
            .unwrap();
        assert_eq!(query.to_string(), "c1=4&c4=17&c5=18");
    }

    #[rstest]
    fn insertion_order_does_not_matter(index: TaxonomyIndex) {
        let builder = QueryBuilder::new(&index);
        let forward = builder
            .build([(TagCategory::Costume, vec![78]), (TagCategory::Basic, vec![23]), (TagCategory::Year, vec![2026])], 3)
            .unwrap();
        let backward = builder
            .build([(TagCategory::Year, vec![2026]), (TagCategory::Basic, vec![23]), (TagCategory::Costume, vec![78])], 3)
            .unwrap();
        let hashed: HashMap<TagCategory, Vec<u32>> =
            [(TagCategory::Basic, vec![23]), (TagCategory::Year, vec![2026]), (TagCategory::Costume, vec![78])].into();
        let from_map = builder.build(hashed, 3).unwrap();
        assert_eq!(forward.to_string(), backward.to_string());
        assert_eq!(forward.to_string(), from_map.to_string());
        assert_eq!(forward.signature(), from_map.signature());
        assert_eq!(forward, backward);
    }

    #[rstest]
    fn same_category_ids_pass_through(index: TaxonomyIndex) {
        let query = QueryBuilder::new(&index).build([(TagCategory::Build, vec![21, 17])], 1).unwrap();
        assert_eq!(query.to_string(), "c4=21,17");
        let styled = QueryBuilder::new(&index)
            .with_style(QueryStyle {
                id_separator: "+".to_string(),
                page_param: "p".to_string(),
            })
            .build([(TagCategory::Build, vec![21, 17])], 2)
            .unwrap();
        assert_eq!(styled.to_string(), "c4=21+17&p=2");
    }

    #[rstest]
    fn repeated_category_merges(index: TaxonomyIndex) {
        let query = QueryBuilder::new(&index)
            .build([(TagCategory::Build, vec![17]), (TagCategory::Build, vec![19])], 1)
            .unwrap();
        assert_eq!(query.selection()[&TagCategory::Build], vec![17, 19]);
    }

    #[rstest]
    fn page_is_only_rendered_after_the_first(index: TaxonomyIndex) {
        let first = QueryBuilder::new(&index).build([(TagCategory::Costume, vec![78])], 1).unwrap();
        assert_eq!(first.params(), vec![("c3".to_string(), "78".to_string())]);
        let second = first.next_page();
        assert_eq!(second.to_string(), "c3=78&page=2");
        assert_ne!(first.signature(), second.signature());
        assert_eq!(second.with_page(1).unwrap(), first);
    }

    #[rstest]
    fn unknown_id_is_rejected(index: TaxonomyIndex) {
        let err = QueryBuilder::new(&index)
            .build([(TagCategory::Costume, vec![78]), (TagCategory::Build, vec![9999])], 1)
            .unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::InvalidTag {
                category: TagCategory::Build,
                id: 9999
            }
        );
    }

    #[rstest]
    #[case::nothing(vec![])]
    #[case::only_empty_lists(vec![(TagCategory::Theme, vec![]), (TagCategory::Year, vec![])])]
    fn empty_selection_is_rejected(index: TaxonomyIndex, #[case] selection: Vec<(TagCategory, Vec<u32>)>) {
        let err = QueryBuilder::new(&index).build(selection, 1).unwrap_err();
        assert_eq!(*err, ErrorKind::EmptySelection);
    }

    #[rstest]
    fn page_zero_is_rejected(index: TaxonomyIndex) {
        let err = QueryBuilder::new(&index).build([(TagCategory::Costume, vec![78])], 0).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidPage(0));
        let query = QueryBuilder::new(&index).build([(TagCategory::Costume, vec![78])], 1).unwrap();
        assert!(query.with_page(0).is_err());
    }
}
