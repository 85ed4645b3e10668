use serde::{Deserialize, Serialize};

/// A performer as linked from a record or found through actor search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub name: String,
    /// Upstream actor id (`0R1n3`), the path segment of the profile URL.
    pub id: String,
    /// Canonical profile URL.
    pub url: String,
}
