use super::{ResourceClient, ResourceError};
use async_trait::async_trait;
use bytes::Bytes;

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Bytes, ResourceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResourceError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        if status == 404 {
            return Err(ResourceError::NotFound(url.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(ResourceError::Status(status));
        }
        resp.bytes()
            .await
            .map_err(|e| ResourceError::Network(e.to_string()))
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}
