//! Offline tag taxonomy.
//!
//! Loads a snapshot of the upstream tag page once and answers lookups from it,
//! then turns a tag selection into the canonical listing filter.

mod category;
pub mod error;
mod index;
mod query;

pub use crate::category::TagCategory;
pub use crate::index::{CategoryInfo, Tag, TaxonomyIndex};
pub use crate::query::{Query, QueryBuilder, QueryStyle};
