//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};
use clap_num::number_range;

use crate::domain::model::CropRect;
use crate::utils::time::parse_time;

/// Arguments for the trim command
#[derive(Args, Debug)]
pub struct TrimArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long, value_parser = parse_time)]
    pub start: f64,

    /// Segment length (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long, value_parser = parse_time)]
    pub duration: f64,

    /// Output file path (default: <stem>_trim_<start>_<end>.mp4)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Re-encode to reduce size
    #[arg(long)]
    pub compress: bool,

    /// Constant Rate Factor used with --compress (clamped to 18-28)
    #[arg(long, default_value = "23", value_parser = parse_crf)]
    pub crf: u8,

    /// Crop rectangle in source pixels: x,y,width,height
    #[arg(long, value_parser = CropRect::parse)]
    pub crop: Option<CropRect>,

    /// Print a JSON report on stdout
    #[arg(long)]
    pub json: bool,
}

fn parse_crf(s: &str) -> Result<u8, String> {
    number_range(s, 0, 51)
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to a file
    Init {
        /// Destination path
        path: PathBuf,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}
