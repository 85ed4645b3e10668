mod actor;
mod code;
mod date;
mod magnet;
mod rating;
mod record;

pub use self::actor::ActorRef;
pub use self::code::Code;
pub use self::date::ReleaseDate;
pub use self::magnet::MagnetLink;
pub(crate) use self::magnet::UNKNOWN_SIZE;
pub use self::rating::Rating;
pub use self::record::{FullRecord, SummaryRecord};

/// Collapses runs of whitespace (including the non-breaking spaces the
/// upstream pads with) and trims.
pub(crate) fn clean_text(s: impl AsRef<str>) -> String {
    s.as_ref().split_whitespace().collect::<Vec<_>>().join(" ")
}
