use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::page::Failure;

/// Destination for downloaded images.
///
/// Names look like `MIDA-583/00001.jpg`; what a name maps to (a file, an
/// object key) is up to the implementation.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// # Errors
    /// [`ErrorKind::Sink`](crate::error::ErrorKind::Sink) when the write
    /// can't be completed.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored names, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(name).cloned()
    }
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.entries.write().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Outcome of materializing one record's images.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageReport {
    /// Sink names written, sorted.
    pub saved: Vec<String>,
    /// One entry per image that couldn't be fetched or stored, keyed by the
    /// sink name it would have had.
    pub failures: Vec<Failure>,
}

impl ImageReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
