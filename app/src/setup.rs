use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::assets::{AssetMaterializer, DirectReference, DownloadAndVerify, HttpFetcher};
use crate::clients::{ApiConfig, ReplicateClient, UploadcareClient};
use crate::config::{self, AppConfig, MaterializationMode};
use crate::error::Error;
use crate::images::{Downscaler, ImagePreparer, Passthrough};
use crate::workflow::{Coordinator, EventSink, WorkflowStateManager};

/// Per-request ceiling; polling has its own attempt limit on top
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Choices for one run, after command-line flags are applied over config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub materialization: MaterializationMode,
    pub output_dir: PathBuf,
    pub downscale: bool,
}

impl RunOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            materialization: config.materialization,
            output_dir: config.output_dir(),
            downscale: true,
        }
    }
}

/// Wire the production clients into a coordinator
pub fn build_coordinator(
    api: &ApiConfig,
    options: &RunOptions,
    sink: Arc<dyn EventSink>,
) -> Result<Coordinator, Error> {
    info!("Photomesh v{}", env!("CARGO_PKG_VERSION"));

    let http = reqwest::Client::builder()
        .user_agent(concat!("photomesh/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .build()?;

    let preparer: Arc<dyn ImagePreparer> = if options.downscale {
        Arc::new(Downscaler::new(config::scratch_dir()))
    } else {
        Arc::new(Passthrough)
    };

    let materializer: Arc<dyn AssetMaterializer> = match options.materialization {
        MaterializationMode::Download => {
            info!("Models will be saved to {:?}", options.output_dir);
            Arc::new(DownloadAndVerify::new(
                Arc::new(HttpFetcher::new(http.clone())),
                options.output_dir.clone(),
            ))
        }
        MaterializationMode::Direct => Arc::new(DirectReference),
    };

    let state = Arc::new(WorkflowStateManager::new(sink));

    Ok(Coordinator::new(
        state,
        preparer,
        Arc::new(UploadcareClient::new(http.clone(), api)),
        Arc::new(ReplicateClient::new(http, api)),
        materializer,
    ))
}
