mod asset_host;
mod config;
mod error;
mod prediction;

// Re-export public types
pub use asset_host::{AssetHost, ProgressCallback, UploadcareClient};
pub use config::{
    ApiConfig, Credentials, MissingSecret, ASSET_HOST_KEY_ENV, DEFAULT_CDN_BASE,
    DEFAULT_PREDICTION_BASE, DEFAULT_UPLOAD_BASE, PREDICTION_TOKEN_ENV,
};
pub use error::{PredictionError, UploadError};
pub(crate) use error::describe_submission;
pub use prediction::{
    GenerationInput, JobStatus, PredictionJob, PredictionService, ReplicateClient, MODEL_VERSION,
};
