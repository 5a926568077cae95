//! TrimX Web
//!
//! Command-line driver for the trim orchestrator.
//!
//! # Usage
//!
//! ```bash
//! trimx-web trim --input clip.mp4 --start 1:05 --duration 8
//! trimx-web trim --input clip.mp4 --start 0 --duration 4 --compress --crf 26 --crop 10,10,640,360
//! trimx-web support
//! trimx-web config show
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use trimx_web::cli::{commands, Cli, Commands};
use trimx_web::config_initialization::initialize_configuration_hierarchy;
use trimx_web::utils::logging::init_logging;
use trimx_web::TrimError;

/// Exit status used when the user cancels an operation
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<TrimError>() {
            Some(trim_err) if trim_err.is_benign() => {
                eprintln!("Operation cancelled");
                ExitCode::from(EXIT_CANCELLED)
            }
            _ => {
                error!("{:#}", err);
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting TrimX Web");
    let config = initialize_configuration_hierarchy(&cli.overrides()).await?;

    match cli.command {
        Commands::Trim(args) => commands::trim(args, &config).await?,
        Commands::Support => commands::support(&config).await?,
        Commands::Config { action } => commands::config(action, &config).await?,
    }

    info!("TrimX Web completed successfully");
    Ok(())
}
