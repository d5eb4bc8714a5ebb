#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "reqwest")]
pub mod reqwest;

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Byte source for manifests, hierarchy pages and node data.
///
/// Implementations own transport concerns (retries, caching, auth); the
/// loaders above this layer never retry.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Bytes, ResourceError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "resource"
    }
}

#[async_trait]
impl<C: ResourceClient + ?Sized> ResourceClient for Arc<C> {
    async fn get(&self, url: &str) -> Result<Bytes, ResourceError> {
        (**self).get(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected HTTP status code: {0}")]
    Status(u16),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unsupported scheme: {0}")]
    Unsupported(String),
}

/// Cheaply clonable handle over a shared [`ResourceClient`].
#[derive(Clone)]
pub struct ResourceLoader {
    client: Arc<dyn ResourceClient>,
}

impl ResourceLoader {
    pub fn new<C: ResourceClient + 'static>(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_arc(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }

    pub async fn get(&self, url: &str) -> Result<Bytes, ResourceError> {
        self.client.get(url).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ResourceError> {
        let bytes = self.client.get(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("client", &self.client.name())
            .finish()
    }
}

/// Directory part of a manifest url, without trailing slash.
///
/// `file:///data/autzen/ept.json` gives `file:///data/autzen`.
pub fn base_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(pos) => &url[..pos],
        None => "",
    }
}

/// Joins url segments with single slashes.
pub fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.trim_start_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_file_name() {
        assert_eq!(base_url("file:///data/autzen/ept.json"), "file:///data/autzen");
        assert_eq!(base_url("https://host/set/ept.json"), "https://host/set");
        assert_eq!(base_url("ept.json"), "");
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("a/", "/b.json"), "a/b.json");
        assert_eq!(join_url("a", "b/c.bin"), "a/b/c.bin");
        assert_eq!(join_url("", "ept.json"), "ept.json");
    }

    #[tokio::test]
    async fn loader_decodes_json() {
        let mut client = memory::MemoryClient::new();
        client.insert("x.json", br#"{"a": 3}"#.to_vec());
        let loader = ResourceLoader::new(client);

        let value: serde_json::Value = loader.get_json("x.json").await.unwrap();
        assert_eq!(value["a"], 3);
    }

    #[tokio::test]
    async fn loader_reports_invalid_json() {
        let mut client = memory::MemoryClient::new();
        client.insert("x.json", b"{not json".to_vec());
        let loader = ResourceLoader::new(client);

        let result: Result<serde_json::Value, _> = loader.get_json("x.json").await;
        assert!(matches!(result, Err(ResourceError::Json(_))));
    }
}
