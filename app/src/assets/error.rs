use photomesh_glb::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("Invalid model asset: {0}")]
    InvalidAsset(#[from] ValidationError),
    #[error("Download failed: {0}")]
    Download(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
