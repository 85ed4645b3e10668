use serde::{Deserialize, Serialize};

use crate::consts;

/// Size text used when the upstream lists a magnet without one.
pub(crate) const UNKNOWN_SIZE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MagnetLink {
    pub name: String,
    /// Size as the upstream prints it (`5.27GB`); never empty.
    pub size: String,
    pub uri: String,
    /// Badges such as `高清` or `字幕`.
    pub labels: Vec<String>,
}

impl MagnetLink {
    /// Size in megabytes, when the size text has a recognizable unit.
    pub fn size_mb(&self) -> Option<f64> {
        let captures = consts::SIZE.captures(&self.size)?;
        let amount: f64 = captures[1].parse().ok()?;
        let scale = match captures[2].to_ascii_uppercase().as_str() {
            "K" => 1.0 / 1024.0,
            "M" => 1.0,
            "G" => 1024.0,
            "T" => 1024.0 * 1024.0,
            _ => return None,
        };
        Some(amount * scale)
    }
}
