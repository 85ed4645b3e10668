mod actors;
mod chain;
mod consts;
mod detail;
mod document;
mod excerpt;
pub mod error;
mod image;
mod listing;
pub mod models;

pub use crate::actors::parse_actor_search;
pub use crate::detail::parse_detail;
pub use crate::excerpt::{EXCERPT_BYTES, excerpt};
pub use crate::image::{absolutize, image_key, upgrade_image_url};
pub use crate::listing::{ListingPage, parse_listing};
