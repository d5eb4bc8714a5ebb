use super::{ResourceClient, ResourceError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory resource store keyed by exact url.
///
/// Useful for fixtures and for hosts that already hold a dataset in memory.
/// Counts every `get` so callers can verify how much I/O a load performed.
#[derive(Debug, Default)]
pub struct MemoryClient {
    entries: HashMap<String, Bytes>,
    requests: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Bytes>) {
        self.entries.insert(url.into(), bytes.into());
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.insert(url, bytes);
        self
    }

    /// Number of `get` calls served so far, misses included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResourceClient for MemoryClient {
    async fn get(&self, url: &str) -> Result<Bytes, ResourceError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(url.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
