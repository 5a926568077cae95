//! Error handling module for TrimX Web
//!
//! [`TrimError`] is the taxonomy surfaced to callers. Every kind except
//! [`TrimError::OperationCancelled`] embeds its remediation hint in the message.

use serde::Serialize;
use thiserror::Error;

const HINT_FILESYSTEM: &str = "Please try again. If the problem persists, restart the session.";
const HINT_ABORTED: &str = "Try: 1) Trim to a shorter segment (< 5 seconds), \
                            2) Use higher compression, or 3) Disable compression.";
const HINT_EXHAUSTED: &str = "Try a lower quality target or trim a shorter segment first.";
const HINT_INIT: &str = "Check that the engine resources are available and try again.";
const HINT_CROP: &str = "Select a crop area at least one pixel wide and high.";

/// Main error type for TrimX Web operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrimError {
    /// `initialize()` was called while a load is already in flight
    #[error("Engine is already loading")]
    AlreadyInLoadProgress,

    /// Engine resources could not be acquired or loaded
    #[error("Failed to initialize engine: {message}. {}", HINT_INIT)]
    InitializationFailed { message: String },

    /// Crop rectangle floors to an empty area
    #[error("Invalid crop dimensions: {width}x{height}. {}", HINT_CROP)]
    InvalidCropDimensions { width: f64, height: f64 },

    /// Start/duration outside the accepted range
    #[error("Invalid trim range: {message}")]
    InvalidTrimRange { message: String },

    /// Operation stopped at a cancellation checkpoint or by engine termination
    #[error("Operation cancelled")]
    OperationCancelled,

    /// Virtual filesystem was left in an inconsistent state
    #[error("File system error while processing: {message}. {}", HINT_FILESYSTEM)]
    FilesystemInconsistency { message: String },

    /// Engine aborted, typically because the output outgrew available memory
    #[error(
        "Processing aborted - {detail}. Engine memory limits prevent finishing large outputs. {}",
        HINT_ABORTED
    )]
    ProcessAborted { detail: String },

    /// Engine ran out of memory or was killed
    #[error(
        "Video too large to process ({input_mb:.1}MB input, {duration:.1}s trimmed). \
         Memory limits prevent processing very large videos with these settings. {}",
        HINT_EXHAUSTED
    )]
    ResourceExhausted { input_mb: f64, duration: f64 },

    /// Anything the classifier does not recognize
    #[error("Failed to process video: {message}")]
    ProcessingFailed { message: String },
}

/// Discriminant of [`TrimError`], used by the failure classifier and in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AlreadyInLoadProgress,
    InitializationFailed,
    InvalidCropDimensions,
    InvalidTrimRange,
    OperationCancelled,
    FilesystemInconsistency,
    ProcessAborted,
    ResourceExhausted,
    ProcessingFailed,
}

impl TrimError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TrimError::AlreadyInLoadProgress => FailureKind::AlreadyInLoadProgress,
            TrimError::InitializationFailed { .. } => FailureKind::InitializationFailed,
            TrimError::InvalidCropDimensions { .. } => FailureKind::InvalidCropDimensions,
            TrimError::InvalidTrimRange { .. } => FailureKind::InvalidTrimRange,
            TrimError::OperationCancelled => FailureKind::OperationCancelled,
            TrimError::FilesystemInconsistency { .. } => FailureKind::FilesystemInconsistency,
            TrimError::ProcessAborted { .. } => FailureKind::ProcessAborted,
            TrimError::ResourceExhausted { .. } => FailureKind::ResourceExhausted,
            TrimError::ProcessingFailed { .. } => FailureKind::ProcessingFailed,
        }
    }

    /// Remediation hint, when the kind has one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TrimError::InitializationFailed { .. } => Some(HINT_INIT),
            TrimError::InvalidCropDimensions { .. } => Some(HINT_CROP),
            TrimError::FilesystemInconsistency { .. } => Some(HINT_FILESYSTEM),
            TrimError::ProcessAborted { .. } => Some(HINT_ABORTED),
            TrimError::ResourceExhausted { .. } => Some(HINT_EXHAUSTED),
            _ => None,
        }
    }

    /// Cancellation is expected and should not be presented as an error
    pub fn is_benign(&self) -> bool {
        matches!(self, TrimError::OperationCancelled)
    }
}

/// Result type alias for TrimX Web operations
pub type TrimResult<T> = std::result::Result<T, TrimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_is_embedded_in_message() {
        let err = TrimError::FilesystemInconsistency {
            message: "ENOENT".to_string(),
        };
        let hint = err.hint().unwrap();
        assert!(err.to_string().contains(hint));
        assert_eq!(err.kind(), FailureKind::FilesystemInconsistency);
    }

    #[test]
    fn test_cancellation_is_benign_without_hint() {
        let err = TrimError::OperationCancelled;
        assert!(err.is_benign());
        assert!(err.hint().is_none());
        assert!(!TrimError::ProcessingFailed { message: "x".into() }.is_benign());
    }

    #[test]
    fn test_resource_exhausted_formats_size() {
        let err = TrimError::ResourceExhausted {
            input_mb: 12.345,
            duration: 7.0,
        };
        assert!(err.to_string().contains("12.3MB input, 7.0s trimmed"));
    }
}
