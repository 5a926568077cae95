// Business rules - Command construction for one trim operation

use serde::Serialize;
use tracing::debug;

use crate::domain::model::*;
use crate::error::TrimResult;

/// Input size below which the finalize pass is considered safe (50 MB)
pub const FINALIZE_MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;
/// Trimmed duration below which the finalize pass is considered safe
pub const FINALIZE_MAX_DURATION_SECS: f64 = 10.0;
/// Quality factor used when a crop forces a re-encode without compression
pub const CROP_DEFAULT_CRF: u8 = 23;
/// Encoder preset used when a crop forces a re-encode without compression
pub const CROP_DEFAULT_PRESET: &str = "veryfast";

/// Tunables for the planner
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerLimits {
    pub finalize_max_input_bytes: u64,
    pub finalize_max_duration_secs: f64,
    pub crop_crf: u8,
    pub crop_preset: String,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            finalize_max_input_bytes: FINALIZE_MAX_INPUT_BYTES,
            finalize_max_duration_secs: FINALIZE_MAX_DURATION_SECS,
            crop_crf: CROP_DEFAULT_CRF,
            crop_preset: CROP_DEFAULT_PRESET.to_string(),
        }
    }
}

/// Codec choice for the operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncodingDecision {
    /// No re-encode; packets are copied
    StreamCopy,
    /// Crop forced a pixel-level transform
    CropReencode { crf: u8, preset: String },
    /// User asked for compression
    Compress { crf: u8 },
}

impl EncodingDecision {
    pub fn reencodes(&self) -> bool {
        !matches!(self, EncodingDecision::StreamCopy)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, EncodingDecision::Compress { .. })
    }
}

/// Why the plan looks the way it does
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDecision {
    pub needs_filters: bool,
    pub encoding: EncodingDecision,
    /// Whether the container metadata relocation pass is applied
    pub finalize: bool,
    pub crop: Option<NormalizedCrop>,
}

/// Ordered engine arguments plus the decision record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPlan {
    pub args: Vec<String>,
    pub decision: PlanDecision,
}

impl CommandPlan {
    /// Arguments joined for logging
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Builds the engine command from user intent
pub struct CommandPlanner {
    limits: PlannerLimits,
}

impl CommandPlanner {
    pub fn new(limits: PlannerLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PlannerLimits {
        &self.limits
    }

    /// Build the command for trimming `input_size` bytes with `options`
    pub fn plan(&self, input_size: u64, options: &TrimOptions) -> TrimResult<CommandPlan> {
        options.validate()?;
        let crop = options.crop.as_ref().map(CropRect::normalize).transpose()?;
        let encoding = self.select_encoding(options, crop.is_some());
        let finalize = self.finalize_is_safe(input_size, options.duration);

        let mut args: Vec<String> = vec![
            "-i".into(),
            VirtualSlot::Input.file_name().into(),
            "-ss".into(),
            options.start_time.to_string(),
            "-t".into(),
            options.duration.to_string(),
        ];

        if let Some(crop) = &crop {
            args.push("-vf".into());
            args.push(crop.filter_expression());
        }

        match &encoding {
            EncodingDecision::StreamCopy => {
                args.extend(["-c", "copy"].map(String::from));
            }
            EncodingDecision::CropReencode { crf, preset } => {
                args.extend([
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    preset.clone(),
                    "-crf".to_string(),
                    crf.to_string(),
                    "-c:a".to_string(),
                    "copy".to_string(),
                ]);
            }
            EncodingDecision::Compress { crf } => {
                // Single thread and fastdecode bound peak engine memory
                args.extend([
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-crf".to_string(),
                    crf.to_string(),
                    "-preset".to_string(),
                    "ultrafast".to_string(),
                    "-tune".to_string(),
                    "fastdecode".to_string(),
                    "-threads".to_string(),
                    "1".to_string(),
                    "-c:a".to_string(),
                    "copy".to_string(),
                ]);
            }
        }

        if finalize {
            args.extend(["-movflags", "+faststart"].map(String::from));
        }

        args.push("-y".into());
        args.push(VirtualSlot::Output.file_name().into());

        let plan = CommandPlan {
            args,
            decision: PlanDecision {
                needs_filters: crop.is_some(),
                encoding,
                finalize,
                crop,
            },
        };
        debug!(args = %plan.display(), finalize, "Built command plan");
        Ok(plan)
    }

    /// Codec decision table
    fn select_encoding(&self, options: &TrimOptions, has_crop: bool) -> EncodingDecision {
        match (options.active_compression(), has_crop) {
            (Some(compression), _) => EncodingDecision::Compress {
                crf: compression.effective_crf(),
            },
            (None, true) => EncodingDecision::CropReencode {
                crf: self.limits.crop_crf,
                preset: self.limits.crop_preset.clone(),
            },
            (None, false) => EncodingDecision::StreamCopy,
        }
    }

    /// The relocation pass needs a second full copy of the output in engine
    /// memory, so it only runs for small inputs and short segments.
    pub fn finalize_is_safe(&self, input_size: u64, duration: f64) -> bool {
        input_size < self.limits.finalize_max_input_bytes
            && duration < self.limits.finalize_max_duration_secs
    }
}

impl Default for CommandPlanner {
    fn default() -> Self {
        Self::new(PlannerLimits::default())
    }
}
