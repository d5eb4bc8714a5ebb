use super::{ResourceClient, ResourceError};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;

/// Reads `file://` urls, and bare paths, from the local filesystem.
#[derive(Clone, Debug, Default)]
pub struct FileClient;

#[async_trait]
impl ResourceClient for FileClient {
    async fn get(&self, url: &str) -> Result<Bytes, ResourceError> {
        if url.contains("://") && !url.starts_with("file://") {
            return Err(ResourceError::Unsupported(
                "This client supports only file:// urls.".to_string(),
            ));
        }
        let path = url.strip_prefix("file://").unwrap_or(url);

        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(ResourceError::NotFound(url.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
