use super::HttpClient;
use crate::error::RpcError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;
        Ok(ReqwestHttpClient { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn load_content(&self, url: &str) -> Result<String, RpcError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Http(format!("GET {url} failed {status} {body}")));
        }
        resp.text().await.map_err(|e| RpcError::Http(e.to_string()))
    }
}
