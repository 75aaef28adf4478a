//! Command-line display surface.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;

use crate::assets::MaterializedAsset;
use crate::clients::Credentials;
use crate::config::{self, ConfigStore, MaterializationMode};
use crate::error::Error;
use crate::keychain::{Keychain, ProviderAccount, SecretStore};
use crate::setup::{self, RunOptions};
use crate::workflow::{EventSink, WorkflowError, WorkflowState};

#[derive(Debug, Parser)]
#[command(name = "photomesh", version, about = "Turn a photo into a 3D model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a 3D model from a photo
    Generate(GenerateArgs),
    /// Manage service secrets stored in the OS keychain
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Photo to turn into a model
    pub image: PathBuf,
    /// Show the remote model instead of downloading it
    #[arg(long)]
    pub direct: bool,
    /// Where downloaded models are written
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Upload the photo without resizing it
    #[arg(long)]
    pub no_downscale: bool,
    /// Print one JSON object per state change
    #[arg(long)]
    pub json: bool,
}

impl GenerateArgs {
    /// Flags win over stored config
    pub fn run_options(&self, base: RunOptions) -> RunOptions {
        RunOptions {
            materialization: if self.direct {
                MaterializationMode::Direct
            } else {
                base.materialization
            },
            output_dir: self.output_dir.clone().unwrap_or(base.output_dir),
            downscale: base.downscale && !self.no_downscale,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Store a secret
    Set { secret: SecretName, value: String },
    /// Remove a stored secret
    Clear { secret: SecretName },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecretName {
    /// Uploadcare public key
    AssetHost,
    /// Replicate API token
    Prediction,
}

impl From<SecretName> for ProviderAccount {
    fn from(name: SecretName) -> Self {
        match name {
            SecretName::AssetHost => ProviderAccount::AssetHost,
            SecretName::Prediction => ProviderAccount::PredictionService,
        }
    }
}

/// Human-readable line for a state, `None` for states not worth a line
pub(crate) fn describe(state: &WorkflowState) -> Option<String> {
    match state {
        WorkflowState::Idle => None,
        WorkflowState::Uploading { progress } => {
            Some(format!("Uploading photo... {:.0}%", progress * 100.0))
        }
        WorkflowState::Generating => Some("Generating 3D model...".to_string()),
        WorkflowState::Downloading => Some("Downloading model...".to_string()),
        WorkflowState::Ready { asset } => Some(format!("Model ready: {}", asset.viewer_source())),
        // Reported once by the caller with the full message
        WorkflowState::Failed { .. } => None,
    }
}

/// Prints states as text lines
pub struct TerminalSink;

impl EventSink for TerminalSink {
    fn emit(&self, state: &WorkflowState) {
        if let Some(line) = describe(state) {
            println!("{}", line);
        }
    }
}

/// Prints states as JSON lines
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&self, state: &WorkflowState) {
        match serde_json::to_string(state) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize state: {}", e),
        }
    }
}

pub async fn execute(cli: Cli, store: &impl ConfigStore) -> Result<(), Error> {
    match cli.command {
        Command::Generate(args) => generate(args, store).await,
        Command::Key { action } => manage_key(action, &Keychain),
    }
}

async fn generate(args: GenerateArgs, store: &impl ConfigStore) -> Result<(), Error> {
    let app_config = config::load_app_config(store);
    let credentials = Credentials::resolve(|name| std::env::var(name).ok(), &Keychain)
        .map_err(WorkflowError::from)?;
    let api = app_config.api_config(credentials);
    let options = args.run_options(RunOptions::from_config(&app_config));

    let sink: Arc<dyn EventSink> = if args.json {
        Arc::new(JsonSink)
    } else {
        Arc::new(TerminalSink)
    };

    let coordinator = setup::build_coordinator(&api, &options, sink)?;
    let asset = coordinator.select_image(&args.image).await?;

    print_result(&asset, args.json)
}

fn print_result(asset: &MaterializedAsset, json: bool) -> Result<(), Error> {
    if json {
        println!("{}", serde_json::to_string(asset)?);
    } else if let Some(digest) = &asset.sha256 {
        println!("sha256 {}", digest);
    }
    Ok(())
}

fn manage_key(action: KeyAction, keychain: &dyn SecretStore) -> Result<(), Error> {
    match action {
        KeyAction::Set { secret, value } => {
            let account = ProviderAccount::from(secret);
            keychain.save(account, value.trim())?;
            println!("Saved {}", account);
        }
        KeyAction::Clear { secret } => {
            let account = ProviderAccount::from(secret);
            keychain.delete(account)?;
            println!("Removed {}", account);
        }
    }
    Ok(())
}
