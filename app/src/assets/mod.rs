//! Turning a generated model URL into something the viewer can open.

mod error;
mod fetcher;
mod materializer;

use std::path::PathBuf;

use serde::Serialize;

pub use error::MaterializeError;
pub use fetcher::{AssetFetcher, HttpFetcher};
pub use materializer::{AssetMaterializer, DirectReference, DownloadAndVerify};

/// The finished model handed to the display surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedAsset {
    /// Output URL reported by the prediction service
    pub source_url: String,
    /// Verified local copy, when one was downloaded
    pub local_path: Option<PathBuf>,
    pub byte_length: u64,
    /// True only if the binary signature check passed
    pub verified: bool,
    /// SHA-256 of the persisted bytes
    pub sha256: Option<String>,
}

impl MaterializedAsset {
    /// Path or URL to pass to a viewer, local copy preferred
    pub fn viewer_source(&self) -> String {
        match &self.local_path {
            Some(path) => path.display().to_string(),
            None => self.source_url.clone(),
        }
    }
}
