// Domain models - Core types and data structures

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{TrimError, TrimResult};

/// Media type declared on every produced artifact
pub const OUTPUT_MEDIA_TYPE: &str = "video/mp4";

/// Lowest accepted compression quality factor (highest fidelity)
pub const CRF_MIN: u8 = 18;
/// Highest accepted compression quality factor (smallest output)
pub const CRF_MAX: u8 = 28;

/// Source video handed to the orchestrator
#[derive(Clone)]
pub struct SourceFile {
    pub name: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a source file from the host filesystem
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in MiB, as shown in user-facing messages
    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / (1024.0 * 1024.0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

/// Compression directive: re-encode at a quality factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionDirective {
    pub enabled: bool,
    pub crf: u8,
}

impl CompressionDirective {
    pub fn new(crf: u8) -> Self {
        Self { enabled: true, crf }
    }

    /// Quality factor clamped to the supported range
    pub fn effective_crf(&self) -> u8 {
        self.crf.clamp(CRF_MIN, CRF_MAX)
    }
}

/// Crop rectangle in source pixels, as selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Floor to whole pixels and clamp into the accepted range.
    ///
    /// Fails when the floored width or height is not positive.
    pub fn normalize(&self) -> TrimResult<NormalizedCrop> {
        let width = self.width.floor();
        let height = self.height.floor();
        if !(width > 0.0) || !(height > 0.0) {
            return Err(TrimError::InvalidCropDimensions {
                width: self.width,
                height: self.height,
            });
        }

        Ok(NormalizedCrop {
            x: floor_clamped(self.x, 0),
            y: floor_clamped(self.y, 0),
            width: floor_clamped(width, 1),
            height: floor_clamped(height, 1),
        })
    }

    /// Parse `x,y,width,height`
    pub fn parse(value: &str) -> Result<Self, String> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid crop value in '{}': {}", value, e))?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(format!(
                "Invalid crop '{}'. Expected x,y,width,height",
                value
            )),
        }
    }
}

fn floor_clamped(value: f64, min: u32) -> u32 {
    let floored = value.floor();
    if floored.is_nan() || floored < min as f64 {
        min
    } else if floored > u32::MAX as f64 {
        u32::MAX
    } else {
        floored as u32
    }
}

/// Whole-pixel crop rectangle ready for the filter expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizedCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl NormalizedCrop {
    /// Crop filter expression `crop=w:h:x:y`
    pub fn filter_expression(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// Editing options for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimOptions {
    /// Start of the kept segment, in seconds
    pub start_time: f64,
    /// Length of the kept segment, in seconds
    pub duration: f64,
    pub compression: Option<CompressionDirective>,
    pub crop: Option<CropRect>,
}

impl TrimOptions {
    /// Create trim options with range validation
    pub fn new(start_time: f64, duration: f64) -> TrimResult<Self> {
        let options = Self {
            start_time,
            duration,
            compression: None,
            crop: None,
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject a negative or non-finite start and a non-positive duration
    pub fn validate(&self) -> TrimResult<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(TrimError::InvalidTrimRange {
                message: format!(
                    "start time must be a non-negative number, got {}",
                    self.start_time
                ),
            });
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(TrimError::InvalidTrimRange {
                message: format!("duration must be positive, got {}", self.duration),
            });
        }
        Ok(())
    }

    pub fn with_compression(mut self, crf: u8) -> Self {
        self.compression = Some(CompressionDirective::new(crf));
        self
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Compression directive, if one is present and enabled
    pub fn active_compression(&self) -> Option<&CompressionDirective> {
        self.compression.as_ref().filter(|c| c.enabled)
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Lifecycle state of the processing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Unloaded => "unloaded",
            EngineState::Loading => "loading",
            EngineState::Loaded => "loaded",
            EngineState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Progress update emitted by the engine while executing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineProgress {
    /// Completion ratio in [0, 1]
    pub ratio: f64,
    /// Current position in seconds, when the engine reports it
    pub time: Option<f64>,
}

impl EngineProgress {
    pub fn new(ratio: f64, time: Option<f64>) -> Self {
        Self {
            ratio: ratio.clamp(0.0, 1.0),
            time,
        }
    }
}

/// Payload returned by the engine when reading a virtual file
#[derive(Debug, Clone, PartialEq)]
pub enum EngineFile {
    Bytes(Vec<u8>),
    Text(String),
}

impl EngineFile {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            EngineFile::Bytes(bytes) => bytes,
            EngineFile::Text(text) => text.into_bytes(),
        }
    }
}

/// The two named slots in the engine's private storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualSlot {
    Input,
    Output,
}

impl VirtualSlot {
    pub const ALL: [VirtualSlot; 2] = [VirtualSlot::Input, VirtualSlot::Output];

    pub fn file_name(&self) -> &'static str {
        match self {
            VirtualSlot::Input => "input.mp4",
            VirtualSlot::Output => "output.mp4",
        }
    }
}

/// Result of a successful operation
#[derive(Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

impl Artifact {
    pub fn video(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            media_type: OUTPUT_MEDIA_TYPE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("len", &self.bytes.len())
            .field("media_type", &self.media_type)
            .finish()
    }
}
