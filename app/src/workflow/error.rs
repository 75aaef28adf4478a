use serde::Serialize;

use crate::assets::MaterializeError;
use crate::clients::{describe_submission, MissingSecret, PredictionError, UploadError};

/// Which step of the workflow failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Config,
    Upload,
    Submission,
    Protocol,
    Timeout,
    InvalidAsset,
    Download,
    Generation,
}

/// Terminal failure of one workflow run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] MissingSecret),
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
    /// `status` is `None` when no response arrived
    #[error("Submission error: {}", describe_submission(.status, .body))]
    Submission { status: Option<u16>, body: String },
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Generation did not finish after {attempts} status checks ({waited_secs}s)")]
    Timeout { attempts: u32, waited_secs: u64 },
    #[error("Invalid model asset: {0}")]
    InvalidAsset(#[from] photomesh_glb::ValidationError),
    #[error("Download error: {0}")]
    Download(String),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Generation was canceled")]
    GenerationCanceled,
}

impl From<PredictionError> for WorkflowError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::Submission { status, body } => {
                WorkflowError::Submission { status, body }
            }
            PredictionError::Protocol(msg) => WorkflowError::Protocol(msg),
        }
    }
}

impl From<MaterializeError> for WorkflowError {
    fn from(err: MaterializeError) -> Self {
        match err {
            MaterializeError::InvalidAsset(e) => WorkflowError::InvalidAsset(e),
            MaterializeError::Download(msg) => WorkflowError::Download(msg),
            MaterializeError::IoError(e) => {
                WorkflowError::Download(format!("Failed to save model: {}", e))
            }
        }
    }
}

impl WorkflowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkflowError::Config(_) => FailureKind::Config,
            WorkflowError::Upload(_) => FailureKind::Upload,
            WorkflowError::Submission { .. } => FailureKind::Submission,
            WorkflowError::Protocol(_) => FailureKind::Protocol,
            WorkflowError::Timeout { .. } => FailureKind::Timeout,
            WorkflowError::InvalidAsset(_) => FailureKind::InvalidAsset,
            WorkflowError::Download(_) => FailureKind::Download,
            WorkflowError::GenerationFailed(_) | WorkflowError::GenerationCanceled => {
                FailureKind::Generation
            }
        }
    }

    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Config(missing) => {
                format!("Setup incomplete: {}.", missing)
            }
            WorkflowError::Upload(e) => e.user_message(),
            WorkflowError::Submission { status, body } => match status {
                Some(401) | Some(403) => {
                    "Invalid prediction service token. Check your settings.".to_string()
                }
                Some(429) => "Rate limit reached. Please wait and try again.".to_string(),
                Some(status) => format!(
                    "Could not start 3D generation (status {}): {}",
                    status, body
                ),
                None => "Could not reach the prediction service. Check your connection.".to_string(),
            },
            WorkflowError::Protocol(msg) => {
                format!("The generation service sent an unexpected response: {}", msg)
            }
            WorkflowError::Timeout { waited_secs, .. } => format!(
                "Generation took longer than {} seconds. Please start again.",
                waited_secs
            ),
            WorkflowError::InvalidAsset(e) => {
                format!("The generated model file is not usable ({}).", e)
            }
            WorkflowError::Download(msg) => {
                format!("Could not download the generated model: {}", msg)
            }
            WorkflowError::GenerationFailed(msg) => format!("3D generation failed: {}", msg),
            WorkflowError::GenerationCanceled => {
                "3D generation was canceled before it finished.".to_string()
            }
        }
    }
}
