use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, error, info};
use sha2::{Digest, Sha256};

use super::error::MaterializeError;
use super::fetcher::AssetFetcher;
use super::MaterializedAsset;

/// Produces the viewer-ready form of a generated model
#[async_trait]
pub trait AssetMaterializer: Send + Sync {
    /// Whether materializing involves a download step
    fn downloads(&self) -> bool;

    async fn materialize(&self, source_url: &str) -> Result<MaterializedAsset, MaterializeError>;
}

/// Hands the remote URL straight to the viewer
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectReference;

#[async_trait]
impl AssetMaterializer for DirectReference {
    fn downloads(&self) -> bool {
        false
    }

    async fn materialize(&self, source_url: &str) -> Result<MaterializedAsset, MaterializeError> {
        info!("Using remote model directly: {}", source_url);
        Ok(MaterializedAsset {
            source_url: source_url.to_string(),
            local_path: None,
            byte_length: 0,
            verified: false,
            sha256: None,
        })
    }
}

/// Downloads the model, checks its GLB signature and keeps a local copy
pub struct DownloadAndVerify {
    fetcher: Arc<dyn AssetFetcher>,
    output_dir: PathBuf,
}

impl DownloadAndVerify {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, output_dir: PathBuf) -> Self {
        Self {
            fetcher,
            output_dir,
        }
    }

    /// Write through a `.partial` file so the final name only ever holds a
    /// complete, verified model.
    async fn persist(&self, bytes: &[u8]) -> Result<PathBuf, MaterializeError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let final_path = unique_model_path(&self.output_dir, epoch_millis()).await?;
        let partial_path = final_path.with_extension(format!("{}.partial", photomesh_glb::FILE_EXTENSION));

        if let Err(e) = tokio::fs::write(&partial_path, bytes).await {
            error!("Failed to write model file: {}", e);
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(MaterializeError::IoError(e));
        }

        if let Err(e) = tokio::fs::rename(&partial_path, &final_path).await {
            error!("Failed to finalize model file: {}", e);
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(MaterializeError::IoError(e));
        }

        Ok(final_path)
    }
}

#[async_trait]
impl AssetMaterializer for DownloadAndVerify {
    fn downloads(&self) -> bool {
        true
    }

    async fn materialize(&self, source_url: &str) -> Result<MaterializedAsset, MaterializeError> {
        let bytes = self.fetcher.fetch(source_url).await?;

        let header = photomesh_glb::validate(&bytes).map_err(|e| {
            error!("Rejected downloaded model: {}", e);
            MaterializeError::InvalidAsset(e)
        })?;
        debug!("GLB version {} ({} bytes)", header.version, bytes.len());

        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let local_path = self.persist(&bytes).await?;

        info!(
            "Model saved to {:?} ({} bytes, sha256 {})",
            local_path,
            bytes.len(),
            sha256
        );

        Ok(MaterializedAsset {
            source_url: source_url.to_string(),
            local_path: Some(local_path),
            byte_length: bytes.len() as u64,
            verified: true,
            sha256: Some(sha256),
        })
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub(crate) fn model_file_name(millis: u128) -> String {
    format!("model_{}.{}", millis, photomesh_glb::FILE_EXTENSION)
}

/// First `model_<millis>.glb` at or after `millis` that does not exist yet
async fn unique_model_path(dir: &Path, mut millis: u128) -> Result<PathBuf, MaterializeError> {
    loop {
        let candidate = dir.join(model_file_name(millis));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        millis += 1;
    }
}
