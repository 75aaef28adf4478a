use std::process::ExitCode;

use clap::Parser;
use photomesh_lib::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    photomesh_lib::run(Cli::parse()).await
}
