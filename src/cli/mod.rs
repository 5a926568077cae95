//! CLI module for TrimX Web
//!
//! Thin driver over [`crate::app::TrimService`]: argument parsing and
//! command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::CliOverrides;
use crate::utils::logging::LogLevel;

pub mod args;
pub mod commands;

/// TrimX Web
///
/// Trim, crop and compress a video segment through an ffmpeg engine.
#[derive(Parser, Debug)]
#[command(name = "trimx-web")]
#[command(about = "TrimX Web - trim, crop and compress video segments")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TRIMX_LOG_LEVEL", global = true)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (default: ./trimx_web.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched first for the engine executables
    #[arg(long, global = true)]
    pub self_hosted_dir: Option<PathBuf>,

    /// Fallback location for the engine executables
    #[arg(long, global = true)]
    pub fallback_base: Option<String>,

    /// Pause between engine execution and output read, in milliseconds
    #[arg(long, global = true)]
    pub settle_delay_ms: Option<u64>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_file: self.config.clone(),
            self_hosted_dir: self.self_hosted_dir.clone(),
            fallback_base: self.fallback_base.clone(),
            settle_delay_ms: self.settle_delay_ms,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract a segment from a video file, optionally cropped and compressed
    Trim(args::TrimArgs),
    /// Check whether the engine can run in this environment
    Support,
    /// Inspect or create configuration files
    Config {
        #[command(subcommand)]
        action: args::ConfigAction,
    },
}
