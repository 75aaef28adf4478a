//! Prediction service client.
//!
//! Wire contract:
//! - `POST {base}/v1/predictions` with a bearer token, expecting `201 {"id": ...}`
//! - `GET {base}/v1/predictions/{id}`, expecting `200 {"status", "output"?, "error"?}`

use std::fmt;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::ApiConfig;
use super::error::PredictionError;

/// Image-to-3D model version the jobs run against
pub const MODEL_VERSION: &str = "e8f6c45206993f297372f5436b90350817bd9b4a0d52d2a76df50c1c8afa2b3c";

/// Status of a generation job as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status string this client does not know
    Unknown(String),
}

impl JobStatus {
    /// Exact match only; anything else is [`JobStatus::Unknown`] and keeps polling
    pub fn parse(raw: &str) -> Self {
        match raw {
            "starting" => JobStatus::Starting,
            "processing" => JobStatus::Processing,
            "succeeded" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "canceled" => JobStatus::Canceled,
            _ => JobStatus::Unknown(raw.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Canceled => write!(f, "canceled"),
            JobStatus::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// One observation of a generation job
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionJob {
    pub id: String,
    pub status: JobStatus,
    pub output_asset_url: Option<String>,
    pub error_message: Option<String>,
}

/// Fixed job parameters. None of these are user-tunable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationInput {
    pub image: String,
    pub seed: u64,
    pub texture_size: u32,
    pub mesh_simplify: f64,
    pub generate_color: bool,
    pub generate_model: bool,
    pub randomize_seed: bool,
    pub generate_normal: bool,
    pub ss_sampling_steps: u32,
    pub slat_sampling_steps: u32,
    pub ss_guidance_strength: f64,
    pub slat_guidance_strength: f64,
}

impl GenerationInput {
    pub fn for_image(image_url: &str) -> Self {
        Self {
            image: image_url.to_string(),
            seed: 0,
            texture_size: 1024,
            mesh_simplify: 0.95,
            generate_color: true,
            generate_model: true,
            randomize_seed: true,
            generate_normal: false,
            ss_sampling_steps: 38,
            slat_sampling_steps: 12,
            ss_guidance_strength: 7.5,
            slat_guidance_strength: 3.0,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatePredictionRequest<'a> {
    version: &'a str,
    input: GenerationInput,
}

#[derive(Debug, Deserialize)]
struct CreatePredictionResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionStatusResponse {
    status: Option<String>,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Submits generation jobs and reports their status
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Create a job for the image at `image_url`, returning its id
    async fn submit(&self, image_url: &str) -> Result<String, PredictionError>;

    /// Check a job's status once
    async fn poll_status(&self, job_id: &str) -> Result<PredictionJob, PredictionError>;
}

/// Replicate predictions API client
pub struct ReplicateClient {
    http: reqwest::Client,
    base: String,
    token: SecretString,
}

impl ReplicateClient {
    pub fn new(http: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            http,
            base: config.prediction_base.trim_end_matches('/').to_string(),
            token: SecretString::from(
                config.credentials.prediction_token.expose_secret().to_string(),
            ),
        }
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/predictions", self.base)
    }

    fn prediction_url(&self, job_id: &str) -> String {
        format!("{}/v1/predictions/{}", self.base, job_id)
    }

    fn submission_request(image_url: &str) -> CreatePredictionRequest<'static> {
        CreatePredictionRequest {
            version: MODEL_VERSION,
            input: GenerationInput::for_image(image_url),
        }
    }

    pub(crate) fn parse_job_id(body: &str) -> Result<String, PredictionError> {
        let parsed: CreatePredictionResponse = serde_json::from_str(body)
            .map_err(|e| PredictionError::Protocol(format!("invalid submission JSON: {}", e)))?;

        parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PredictionError::Protocol("submission response has no id".to_string()))
    }

    pub(crate) fn parse_job(job_id: &str, body: &str) -> Result<PredictionJob, PredictionError> {
        let parsed: PredictionStatusResponse = serde_json::from_str(body)
            .map_err(|e| PredictionError::Protocol(format!("invalid status JSON: {}", e)))?;

        let status = parsed
            .status
            .map(|s| JobStatus::parse(&s))
            .ok_or_else(|| PredictionError::Protocol("status response has no status".to_string()))?;

        let output_asset_url = parsed
            .output
            .as_ref()
            .and_then(|output| output.get("model_file"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let error_message = match parsed.error {
            None | Some(Value::Null) => None,
            Some(Value::String(msg)) => Some(msg),
            Some(other) => Some(other.to_string()),
        };

        Ok(PredictionJob {
            id: job_id.to_string(),
            status,
            output_asset_url,
            error_message,
        })
    }
}

#[async_trait]
impl PredictionService for ReplicateClient {
    async fn submit(&self, image_url: &str) -> Result<String, PredictionError> {
        info!("Submitting generation job for {}", image_url);

        let response = self
            .http
            .post(self.predictions_url())
            .bearer_auth(self.token.expose_secret())
            .json(&Self::submission_request(image_url))
            .send()
            .await
            .map_err(|e| {
                error!("Submission request error: {}", e);
                PredictionError::Submission {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::CREATED {
            error!("Submission rejected ({}): {}", status, body);
            return Err(PredictionError::Submission {
                status: Some(status.as_u16()),
                body,
            });
        }

        let job_id = Self::parse_job_id(&body)?;
        info!("Generation job created: {}", job_id);
        Ok(job_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<PredictionJob, PredictionError> {
        let response = self
            .http
            .get(self.prediction_url(job_id))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                error!("Status request error: {}", e);
                PredictionError::Protocol(format!("status request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            error!("Status check returned {}: {}", status, body);
            return Err(PredictionError::Protocol(format!(
                "status check returned {}: {}",
                status, body
            )));
        }

        let job = Self::parse_job(job_id, &body)?;
        debug!("Job {} status: {}", job.id, job.status);
        Ok(job)
    }
}
