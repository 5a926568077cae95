//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::adapters::toml_config::{TomlConfigAdapter, TrimConfig};
use crate::app::TrimService;
use crate::cli::args::{ConfigAction, TrimArgs};
use crate::domain::model::{Artifact, CropRect, EngineProgress, SourceFile, TrimOptions};
use crate::error::{FailureKind, TrimError};
use crate::utils::size::{format_file_size, is_file_too_large};
use crate::utils::time::format_time;

/// Machine-readable outcome printed by `trim --json`
#[derive(Debug, Serialize)]
struct TrimReport {
    status: &'static str,
    input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    start_time: f64,
    duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    crf: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crop: Option<CropRect>,
    input_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReport>,
    elapsed_ms: u128,
    finished_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct FailureReport {
    kind: FailureKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

impl From<&TrimError> for FailureReport {
    fn from(err: &TrimError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            hint: err.hint(),
        }
    }
}

/// Execute the trim command
pub async fn trim(args: TrimArgs, config: &TrimConfig) -> Result<()> {
    info!(
        input = %args.input.display(),
        start = args.start,
        duration = args.duration,
        "Starting trim operation"
    );

    if !args.input.is_file() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    let mut options = TrimOptions::new(args.start, args.duration)?;
    if args.compress {
        options = options.with_compression(args.crf);
    }
    if let Some(crop) = args.crop {
        options = options.with_crop(crop);
    }

    let output_path = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&args.input, options.start_time, options.end_time())?,
    };

    let source = SourceFile::from_path(&args.input)
        .await
        .with_context(|| format!("Failed to read input file {}", args.input.display()))?;
    info!(
        "Input: {} ({}), segment {} - {}",
        source.name,
        format_file_size(source.size()),
        format_time(options.start_time),
        format_time(options.end_time())
    );
    if is_file_too_large(source.size(), config.limits.large_file_warning_mb) {
        warn!(
            "Input is larger than {} MB; processing may run out of memory",
            config.limits.large_file_warning_mb
        );
    }

    let service = TrimService::with_process_engine(config);
    service.on_progress(Arc::new(|progress: EngineProgress| {
        debug!(
            percent = (progress.ratio * 100.0).round(),
            time = progress.time,
            "Engine progress"
        );
    }));

    let started = Instant::now();
    let outcome = run_until_interrupted(&service, &source, &options).await?;

    let mut report = TrimReport {
        status: "completed",
        input: args.input.clone(),
        output: None,
        start_time: options.start_time,
        duration: options.duration,
        crf: options.active_compression().map(|c| c.effective_crf()),
        crop: options.crop,
        input_bytes: source.size(),
        output_bytes: None,
        media_type: None,
        failure: None,
        elapsed_ms: 0,
        finished_at: Utc::now(),
    };

    let result = match outcome {
        Ok(artifact) => {
            tokio::fs::write(&output_path, &artifact.bytes)
                .await
                .with_context(|| format!("Failed to write output file {}", output_path.display()))?;
            info!(
                "Wrote {} ({})",
                output_path.display(),
                format_file_size(artifact.len() as u64)
            );
            report.output = Some(output_path);
            report.output_bytes = Some(artifact.len());
            report.media_type = Some(artifact.media_type);
            Ok(())
        }
        Err(err) => {
            if err.is_benign() {
                warn!("Trim cancelled");
                report.status = "cancelled";
            } else {
                error!(kind = ?err.kind(), "{}", err);
                report.status = "failed";
            }
            report.failure = Some(FailureReport::from(&err));
            Err(err)
        }
    };

    report.elapsed_ms = started.elapsed().as_millis();
    report.finished_at = Utc::now();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    result.map_err(anyhow::Error::from)
}

/// Drive one operation; the first Ctrl-C cancels at the next checkpoint,
/// the second terminates the engine.
async fn run_until_interrupted(
    service: &TrimService,
    source: &SourceFile,
    options: &TrimOptions,
) -> Result<Result<Artifact, TrimError>> {
    let run = service.run(source, options);
    tokio::pin!(run);

    let mut interrupts = 0u32;
    loop {
        tokio::select! {
            outcome = &mut run => return Ok(outcome),
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                interrupts += 1;
                if interrupts == 1 {
                    warn!(
                        "Interrupt received, cancelling at the next checkpoint \
                         (press Ctrl-C again to stop the engine)"
                    );
                    service.cancel();
                } else {
                    warn!("Second interrupt received, terminating the engine");
                    let (outcome, reload) = tokio::join!(&mut run, service.abort());
                    if let Err(e) = reload {
                        warn!("Engine reload after termination failed: {}", e);
                    }
                    return Ok(outcome);
                }
            }
        }
    }
}

/// Execute the support command
pub async fn support(config: &TrimConfig) -> Result<()> {
    let service = TrimService::with_process_engine(config);
    if service.is_supported().await {
        println!("Engine '{}' is available", config.engine.core_resource);
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Engine '{}' cannot run in this environment",
            config.engine.core_resource
        ))
    }
}

/// Execute a config subcommand
pub async fn config(action: ConfigAction, config: &TrimConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", TomlConfigAdapter::serialize(config)?);
            Ok(())
        }
        ConfigAction::Init { path, force } => {
            if !force && tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(anyhow::anyhow!(
                    "{} already exists (use --force to replace it)",
                    path.display()
                ));
            }
            TomlConfigAdapter::save(&TrimConfig::default(), &path).await?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// `<stem>_trim_<start>_<end>.mp4` next to the input
fn default_output_path(input: &Path, start: f64, end: f64) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Invalid input file path: {}", input.display()))?
        .to_string_lossy();
    let name = format!(
        "{}_trim_{}_{}.mp4",
        stem,
        format_seconds_short(start),
        format_seconds_short(end)
    );
    Ok(input.with_file_name(name))
}

/// Seconds with at most one decimal, e.g. `12` or `12.5`
fn format_seconds_short(seconds: f64) -> String {
    let rounded = (seconds * 10.0).round() / 10.0;
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/videos/holiday.mov"), 2.0, 7.5).unwrap();
        assert_eq!(path, PathBuf::from("/videos/holiday_trim_2_7.5.mp4"));
    }

    #[test]
    fn test_failure_report_carries_hint() {
        let err = TrimError::ResourceExhausted {
            input_mb: 120.0,
            duration: 4.0,
        };
        let report = FailureReport::from(&err);
        assert_eq!(report.kind, FailureKind::ResourceExhausted);
        assert!(report.hint.is_some());

        let cancelled = FailureReport::from(&TrimError::OperationCancelled);
        assert!(cancelled.hint.is_none());
    }

    #[tokio::test]
    async fn test_config_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trimx_web.toml");
        let defaults = TrimConfig::default();

        config(ConfigAction::Init { path: path.clone(), force: false }, &defaults)
            .await
            .unwrap();
        assert!(path.exists());
        assert!(config(ConfigAction::Init { path: path.clone(), force: false }, &defaults)
            .await
            .is_err());
        config(ConfigAction::Init { path, force: true }, &defaults)
            .await
            .unwrap();
    }
}
