use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error};

use sealed_upload::{cli::Cli, pipeline, utils::init_logger, Config, UploadOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    init_logger(cli.quiet, cli.verbose);

    ExitCode::from(exit_status(run(&cli).await))
}

async fn run(cli: &Cli) -> anyhow::Result<UploadOutcome> {
    // Load configuration
    let mut config = Config::from_env().context("failed to load configuration")?;
    cli.apply(&mut config);
    debug!("Configuration loaded: {:?}", config.upload);

    let request = cli.request(&config)?;
    let outcome = pipeline::run(&config, &request).await?;
    Ok(outcome)
}

/// The one place a finished run is turned into a process status.
///
/// Fatal errors are logged here; a rejected PUT was already logged by the
/// pipeline and only changes the status.
fn exit_status(result: anyhow::Result<UploadOutcome>) -> u8 {
    match result {
        Ok(outcome) if outcome.is_success() => 0,
        Ok(_) => 1,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}
