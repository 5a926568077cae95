// TOML config adapter - Configuration management using TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::lifecycle::ResourceNames;
use crate::domain::errors::*;
use crate::domain::rules::{
    PlannerLimits, CROP_DEFAULT_CRF, CROP_DEFAULT_PRESET, FINALIZE_MAX_DURATION_SECS,
    FINALIZE_MAX_INPUT_BYTES,
};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "trimx_web.toml";

/// Engine resource settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub core_resource: String,
    pub binary_resource: String,
    pub self_hosted_dir: Option<PathBuf>,
    pub fallback_base: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            core_resource: "ffmpeg".to_string(),
            binary_resource: "ffprobe".to_string(),
            self_hosted_dir: Some(PathBuf::from("vendor/ffmpeg")),
            fallback_base: String::new(),
        }
    }
}

/// Memory-risk thresholds and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub finalize_max_input_bytes: u64,
    pub finalize_max_duration_secs: f64,
    pub settle_delay_ms: u64,
    pub large_file_warning_mb: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            finalize_max_input_bytes: FINALIZE_MAX_INPUT_BYTES,
            finalize_max_duration_secs: FINALIZE_MAX_DURATION_SECS,
            settle_delay_ms: 100,
            large_file_warning_mb: 500,
        }
    }
}

/// Re-encode settings used when a crop forces encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingSection {
    pub crop_crf: u8,
    pub crop_preset: String,
}

impl Default for EncodingSection {
    fn default() -> Self {
        Self {
            crop_crf: CROP_DEFAULT_CRF,
            crop_preset: CROP_DEFAULT_PRESET.to_string(),
        }
    }
}

/// Complete TrimX Web configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    pub engine: EngineSection,
    pub limits: LimitsSection,
    pub encoding: EncodingSection,
}

impl TrimConfig {
    /// Reject values the planner cannot work with
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.engine.core_resource.trim().is_empty()
            || self.engine.binary_resource.trim().is_empty()
        {
            return Err(DomainError::ConfigFail(
                "engine resource names cannot be empty".to_string(),
            ));
        }
        if self.limits.finalize_max_input_bytes == 0 {
            return Err(DomainError::ConfigFail(
                "finalize_max_input_bytes must be greater than zero".to_string(),
            ));
        }
        if !(self.limits.finalize_max_duration_secs > 0.0) {
            return Err(DomainError::ConfigFail(
                "finalize_max_duration_secs must be positive".to_string(),
            ));
        }
        if self.encoding.crop_crf > 51 {
            return Err(DomainError::ConfigFail(
                "crop_crf cannot exceed 51".to_string(),
            ));
        }
        Ok(())
    }

    pub fn planner_limits(&self) -> PlannerLimits {
        PlannerLimits {
            finalize_max_input_bytes: self.limits.finalize_max_input_bytes,
            finalize_max_duration_secs: self.limits.finalize_max_duration_secs,
            crop_crf: self.encoding.crop_crf,
            crop_preset: self.encoding.crop_preset.clone(),
        }
    }

    pub fn resource_names(&self) -> ResourceNames {
        ResourceNames {
            core: self.engine.core_resource.clone(),
            binary: self.engine.binary_resource.clone(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.limits.settle_delay_ms)
    }
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<TrimConfig, DomainError> {
        let config: TrimConfig = toml::from_str(content)
            .map_err(|e| DomainError::ConfigFail(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string
    pub fn serialize(config: &TrimConfig) -> Result<String, DomainError> {
        toml::to_string_pretty(config)
            .map_err(|e| DomainError::ConfigFail(format!("Failed to serialize config: {}", e)))
    }

    /// Load configuration from file
    pub async fn load(path: &Path) -> Result<TrimConfig, DomainError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::ConfigFail(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file, creating parent directories
    pub async fn save(config: &TrimConfig, path: &Path) -> Result<(), DomainError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::ConfigFail(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = Self::serialize(config)?;
        tokio::fs::write(path, content).await.map_err(|e| {
            DomainError::ConfigFail(format!("Failed to write config file: {}", e))
        })?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }
}
