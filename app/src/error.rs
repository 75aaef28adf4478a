use derive_more::{Display, From};

use crate::workflow::{CoordinatorError, WorkflowError};

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    #[display("{_0}")]
    Coordinator(CoordinatorError),

    #[from]
    #[display("{_0}")]
    Workflow(WorkflowError),

    #[from]
    #[display("Keychain error: {_0}")]
    Keychain(keyring::Error),

    #[from]
    #[display("HTTP client error: {_0}")]
    Http(reqwest::Error),

    #[from]
    #[display("IO error: {_0}")]
    Io(std::io::Error),

    #[from]
    #[display("JSON error: {_0}")]
    Json(serde_json::Error),
}

impl Error {
    /// Returns a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Error::Coordinator(CoordinatorError::Workflow(e)) | Error::Workflow(e) => {
                e.user_message()
            }
            Error::Coordinator(CoordinatorError::Busy(_)) => {
                "A model is already being generated.".to_string()
            }
            Error::Keychain(e) => format!("Could not access the OS keychain: {}", e),
            other => other.to_string(),
        }
    }
}
