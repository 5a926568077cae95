//! Configuration initialization and hierarchy management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::adapters::toml_config::{TomlConfigAdapter, TrimConfig, DEFAULT_CONFIG_FILE};

/// Values supplied on the command line; `None` leaves lower layers in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub self_hosted_dir: Option<PathBuf>,
    pub fallback_base: Option<String>,
    pub settle_delay_ms: Option<u64>,
}

/// Build the effective configuration following precedence: CLI > Env > File > Defaults
pub async fn initialize_configuration_hierarchy(cli: &CliOverrides) -> Result<TrimConfig> {
    info!("Initializing configuration hierarchy");

    let mut config = load_config_file(cli.config_file.as_deref()).await?;
    apply_environment_overrides(&mut config, |key| std::env::var(key).ok())?;
    apply_cli_overrides(&mut config, cli);

    config
        .validate()
        .context("Effective configuration is invalid")?;
    debug!(?config, "Configuration hierarchy initialized");
    Ok(config)
}

/// An explicit path must exist; the default file is optional
async fn load_config_file(explicit: Option<&Path>) -> Result<TrimConfig> {
    if let Some(path) = explicit {
        return TomlConfigAdapter::load(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if tokio::fs::try_exists(default_path).await.unwrap_or(false) {
        info!("Loading configuration from: {}", default_path.display());
        return TomlConfigAdapter::load(default_path)
            .await
            .context("Failed to load default configuration file");
    }

    debug!("No configuration file found, using defaults");
    Ok(TrimConfig::default())
}

/// Apply `TRIMX_*` environment variables through `lookup`
pub fn apply_environment_overrides<F>(config: &mut TrimConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_overrides = 0;

    if let Some(dir) = lookup("TRIMX_SELF_HOSTED_DIR") {
        config.engine.self_hosted_dir = if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        };
        env_overrides += 1;
    }
    if let Some(base) = lookup("TRIMX_FALLBACK_BASE") {
        config.engine.fallback_base = base;
        env_overrides += 1;
    }
    if let Some(delay) = lookup("TRIMX_SETTLE_DELAY_MS") {
        config.limits.settle_delay_ms = delay
            .trim()
            .parse()
            .with_context(|| format!("Invalid TRIMX_SETTLE_DELAY_MS value: {}", delay))?;
        env_overrides += 1;
    }

    if env_overrides > 0 {
        info!("Applied {} environment variable overrides", env_overrides);
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut TrimConfig, cli: &CliOverrides) {
    let mut cli_overrides = 0;

    if let Some(dir) = &cli.self_hosted_dir {
        config.engine.self_hosted_dir = Some(dir.clone());
        cli_overrides += 1;
    }
    if let Some(base) = &cli.fallback_base {
        config.engine.fallback_base = base.clone();
        cli_overrides += 1;
    }
    if let Some(delay) = cli.settle_delay_ms {
        config.limits.settle_delay_ms = delay;
        cli_overrides += 1;
    }

    if cli_overrides > 0 {
        info!("Applied {} CLI configuration overrides", cli_overrides);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let vars = env(&[
            ("TRIMX_FALLBACK_BASE", "/usr/local/bin"),
            ("TRIMX_SETTLE_DELAY_MS", "50"),
            ("TRIMX_SELF_HOSTED_DIR", ""),
        ]);
        let mut config = TrimConfig::default();
        apply_environment_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.engine.fallback_base, "/usr/local/bin");
        assert_eq!(config.limits.settle_delay_ms, 50);
        assert_eq!(config.engine.self_hosted_dir, None);
    }

    #[test]
    fn test_invalid_environment_value_is_reported() {
        let vars = env(&[("TRIMX_SETTLE_DELAY_MS", "soon")]);
        let mut config = TrimConfig::default();
        assert!(apply_environment_overrides(&mut config, |k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_cli_overrides_win_over_environment() {
        let vars = env(&[("TRIMX_SETTLE_DELAY_MS", "50")]);
        let mut config = TrimConfig::default();
        apply_environment_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();
        apply_cli_overrides(
            &mut config,
            &CliOverrides {
                settle_delay_ms: Some(5),
                ..Default::default()
            },
        );

        assert_eq!(config.limits.settle_delay_ms, 5);
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let overrides = CliOverrides {
            config_file: Some(PathBuf::from("/nonexistent/trimx_web.toml")),
            ..Default::default()
        };
        assert!(initialize_configuration_hierarchy(&overrides).await.is_err());
    }
}
