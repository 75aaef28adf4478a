use async_trait::async_trait;
use log::{error, info};

use super::error::MaterializeError;

/// Fetches the bytes behind a URL
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MaterializeError>;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MaterializeError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            error!("Model download request error: {}", e);
            MaterializeError::Download(format!("Failed to start download: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Model download failed with status {}", status);
            return Err(MaterializeError::Download(format!(
                "Download failed with status: {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MaterializeError::Download(format!("Download error: {}", e)))?;

        info!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}
