#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Image could not be prepared: {0}")]
    ImageError(String),
    #[error("Upload request failed: {0}")]
    RequestFailed(String),
    #[error("Asset host returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Unexpected asset host response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    /// The job could not be created. `status` is `None` when no response arrived.
    #[error("{}", describe_submission(.status, .body))]
    Submission { status: Option<u16>, body: String },
    /// The service answered with something other than the documented contract.
    #[error("Unexpected prediction service response: {0}")]
    Protocol(String),
}

pub(crate) fn describe_submission(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(status) => format!("Prediction service returned status {}: {}", status, body),
        None => format!("Prediction request failed: {}", body),
    }
}

impl UploadError {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            UploadError::FileNotFound(_) => {
                "Photo not found. Please pick the image again.".to_string()
            }
            UploadError::IoError(_) => "Failed to read the photo. Please try again.".to_string(),
            UploadError::ImageError(msg) => format!("The photo could not be processed: {}", msg),
            UploadError::RequestFailed(_) => {
                "Could not reach the upload service. Check your connection.".to_string()
            }
            UploadError::Rejected { status, body } => {
                if *status == 401 || *status == 403 {
                    "The upload service rejected the public key. Check your settings.".to_string()
                } else if body.is_empty() {
                    format!("Upload failed (status {}).", status)
                } else {
                    format!("Upload failed (status {}): {}", status, body)
                }
            }
            UploadError::MalformedResponse(_) => {
                "The upload service sent an unexpected response.".to_string()
            }
        }
    }
}
