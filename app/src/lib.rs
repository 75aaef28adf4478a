use std::process::ExitCode;

pub mod assets;
pub mod cli;
pub mod clients;
pub mod config;
mod error;
pub mod images;
pub mod keychain;
pub mod log;
pub mod polling;
pub mod setup;
pub mod telemetry;
pub mod workflow;

pub use error::Error;

/// Runs one CLI invocation and maps the outcome to a process exit code
pub async fn run(cli: cli::Cli) -> ExitCode {
    log::init();

    let store = config::FileConfigStore::open_default();
    let _sentry = telemetry::init_sentry(&store);

    match cli::execute(cli, &store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::debug!("Command failed: {:?}", e);
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
