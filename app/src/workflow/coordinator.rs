//! Drives one photo through upload, generation and materialization.
//!
//! Every step awaits the previous one. State changes go through
//! [`WorkflowStateManager`], so the coordinator is the only writer and
//! display surfaces only observe.

use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::assets::{AssetMaterializer, MaterializedAsset};
use crate::clients::{AssetHost, JobStatus, PredictionJob, PredictionService, ProgressCallback};
use crate::images::ImagePreparer;
use crate::polling::{poll_until, Attempt, Delay, PollError, PollPolicy, TokioDelay};
use crate::telemetry;

use super::error::WorkflowError;
use super::state_manager::{
    TransitionRejection, TransitionResult, WorkflowEvent, WorkflowState, WorkflowStateManager,
};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A run is already in flight, or the last failure was not acknowledged
    #[error("Image selection ignored: {0}")]
    Busy(TransitionRejection),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Clone)]
pub struct Coordinator {
    state: Arc<WorkflowStateManager>,
    preparer: Arc<dyn ImagePreparer>,
    asset_host: Arc<dyn AssetHost>,
    predictions: Arc<dyn PredictionService>,
    materializer: Arc<dyn AssetMaterializer>,
    delay: Arc<dyn Delay>,
    policy: PollPolicy,
}

impl Coordinator {
    pub fn new(
        state: Arc<WorkflowStateManager>,
        preparer: Arc<dyn ImagePreparer>,
        asset_host: Arc<dyn AssetHost>,
        predictions: Arc<dyn PredictionService>,
        materializer: Arc<dyn AssetMaterializer>,
    ) -> Self {
        Self {
            state,
            preparer,
            asset_host,
            predictions,
            materializer,
            delay: Arc::new(TokioDelay),
            policy: PollPolicy::default(),
        }
    }

    /// Replace the polling clock and limits
    pub fn with_polling(mut self, delay: Arc<dyn Delay>, policy: PollPolicy) -> Self {
        self.delay = delay;
        self.policy = policy;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state.current()
    }

    /// Dismiss a failure or a finished model
    pub fn acknowledge(&self) -> Result<TransitionResult, TransitionRejection> {
        self.state.transition(WorkflowEvent::Acknowledge)
    }

    /// Run the whole workflow for one image.
    ///
    /// Returns [`CoordinatorError::Busy`] without touching state when a run
    /// is already in flight. Any step failure ends the run in `Failed`.
    pub async fn select_image(&self, image: &Path) -> Result<MaterializedAsset, CoordinatorError> {
        if let Err(rejection) = self.state.transition(WorkflowEvent::SelectImage) {
            warn!("{}", rejection);
            return Err(CoordinatorError::Busy(rejection));
        }

        let run_id = uuid::Uuid::new_v4();
        info!("Run {} started for {:?}", run_id, image);

        match self.run(image).await {
            Ok(asset) => {
                self.advance(WorkflowEvent::AssetReady(asset.clone()));
                info!("Run {} ready: {}", run_id, asset.viewer_source());
                Ok(asset)
            }
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                telemetry::report_failure(e.kind(), &e.to_string());
                self.advance(WorkflowEvent::Fail {
                    kind: e.kind(),
                    message: e.user_message(),
                });
                Err(CoordinatorError::Workflow(e))
            }
        }
    }

    async fn run(&self, image: &Path) -> Result<MaterializedAsset, WorkflowError> {
        let asset_url = self.upload(image).await?;
        self.advance(WorkflowEvent::UploadComplete);

        let job_id = self.predictions.submit(&asset_url).await?;
        info!("Submitted generation job {}", job_id);

        let output_url = self.wait_for_output(&job_id).await?;

        if self.materializer.downloads() {
            self.advance(WorkflowEvent::JobSucceeded);
        }

        Ok(self.materializer.materialize(&output_url).await?)
    }

    async fn upload(&self, image: &Path) -> Result<String, WorkflowError> {
        let prepared = self.preparer.prepare(image).await?;

        let state = Arc::clone(&self.state);
        let progress: ProgressCallback = Arc::new(move |fraction| {
            if let Err(rejection) = state.transition(WorkflowEvent::UploadProgress(fraction)) {
                debug!("{}", rejection);
            }
        });

        let result = self.asset_host.upload(&prepared.path, progress).await;

        if prepared.scratch {
            if let Err(e) = tokio::fs::remove_file(&prepared.path).await {
                warn!("Failed to remove scratch image {:?}: {}", prepared.path, e);
            }
        }

        let asset_url = result?;
        info!("Image available at {}", asset_url);
        Ok(asset_url)
    }

    async fn wait_for_output(&self, job_id: &str) -> Result<String, WorkflowError> {
        let predictions = &self.predictions;

        let result = poll_until(self.policy, self.delay.as_ref(), move |attempt| async move {
            let job = predictions.poll_status(job_id).await?;
            debug!("Status check {}: job {} is {}", attempt, job.id, job.status);
            job_outcome(job)
        })
        .await;

        result.map_err(|e| match e {
            PollError::Check(e) => e,
            PollError::Exhausted { attempts } => WorkflowError::Timeout {
                attempts,
                waited_secs: self.policy.ceiling().as_secs(),
            },
        })
    }

    fn advance(&self, event: WorkflowEvent) {
        if let Err(rejection) = self.state.transition(event) {
            warn!("{}", rejection);
        }
    }
}

/// Map one status observation to keep-polling, done, or a terminal error
fn job_outcome(job: PredictionJob) -> Result<Attempt<String>, WorkflowError> {
    match job.status {
        JobStatus::Starting | JobStatus::Processing => Ok(Attempt::Pending),
        JobStatus::Succeeded => match job.output_asset_url {
            Some(url) => Ok(Attempt::Done(url)),
            None => Err(WorkflowError::Protocol(format!(
                "job {} succeeded without an output model",
                job.id
            ))),
        },
        JobStatus::Failed => Err(WorkflowError::GenerationFailed(
            job.error_message
                .unwrap_or_else(|| "the service did not give a reason".to_string()),
        )),
        JobStatus::Canceled => Err(WorkflowError::GenerationCanceled),
        JobStatus::Unknown(raw) => {
            warn!("Job {} reported unknown status {:?}, still waiting", job.id, raw);
            Ok(Attempt::Pending)
        }
    }
}
