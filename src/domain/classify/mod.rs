//! Failure classification
//!
//! The engine reports failures as free text. [`FAILURE_SIGNATURES`] is the
//! single table of recognized fragments; entries are checked in order and the
//! first match wins.

use crate::error::{FailureKind, TrimError};

/// Recognized lower-cased fragments, in priority order
pub const FAILURE_SIGNATURES: &[(FailureKind, &[&str])] = &[
    (FailureKind::OperationCancelled, &["cancel"]),
    (
        FailureKind::FilesystemInconsistency,
        &["fs error", "enoent", "eexist", "eacces", "filesystem"],
    ),
    (FailureKind::ProcessAborted, &["abort", "aborted"]),
    (
        FailureKind::ResourceExhausted,
        &["memory", "allocation", "out of memory", "killed"],
    ),
];

/// Stage of the operation at which a failure surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Prepare,
    Write,
    Execute,
    Read,
}

/// What the classifier needs to know about the failed operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureContext {
    pub stage: FailureStage,
    pub input_size: u64,
    pub duration: f64,
    pub compressed: bool,
    /// The engine logged an abort before the failure surfaced
    pub abort_logged: bool,
    /// The failure came from the engine's file layer
    pub filesystem: bool,
}

impl FailureContext {
    fn input_mb(&self) -> f64 {
        self.input_size as f64 / (1024.0 * 1024.0)
    }
}

/// Match lower-cased failure text against the signature table
pub fn match_signature(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    FAILURE_SIGNATURES
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|f| lowered.contains(f)))
        .map(|(kind, _)| *kind)
        .unwrap_or(FailureKind::ProcessingFailed)
}

/// Output size estimate used in read-stage failures: ~0.1 MB per trimmed
/// second, 40% less when compressed.
pub fn estimate_output_mb(duration: f64, compressed: bool) -> f64 {
    let estimate = duration * 0.1;
    if compressed {
        estimate * 0.6
    } else {
        estimate
    }
}

/// Turn raw failure text into a user-facing error.
///
/// `message` is the engine's own text, without any variant label.
pub fn classify(message: &str, ctx: &FailureContext) -> TrimError {
    let mut kind = match_signature(message);
    if kind == FailureKind::ProcessingFailed {
        if ctx.abort_logged {
            kind = FailureKind::ProcessAborted;
        } else if ctx.filesystem {
            kind = FailureKind::FilesystemInconsistency;
        }
    }

    match kind {
        FailureKind::OperationCancelled => TrimError::OperationCancelled,
        FailureKind::FilesystemInconsistency => TrimError::FilesystemInconsistency {
            message: message.to_string(),
        },
        FailureKind::ProcessAborted if ctx.stage == FailureStage::Read => {
            TrimError::ProcessAborted {
                detail: read_stage_detail(ctx),
            }
        }
        FailureKind::ProcessAborted => TrimError::ProcessAborted {
            detail: format!(
                "output file too large ({:.1}MB input, {:.1}s trimmed)",
                ctx.input_mb(),
                ctx.duration
            ),
        },
        // Memory failures while reading the output are the same blowup as an abort
        FailureKind::ResourceExhausted if ctx.stage == FailureStage::Read => {
            TrimError::ProcessAborted {
                detail: read_stage_detail(ctx),
            }
        }
        FailureKind::ResourceExhausted => TrimError::ResourceExhausted {
            input_mb: ctx.input_mb(),
            duration: ctx.duration,
        },
        _ => TrimError::ProcessingFailed {
            message: message.to_string(),
        },
    }
}

fn read_stage_detail(ctx: &FailureContext) -> String {
    format!(
        "output file too large to read ({:.1}MB input, {:.1}s trimmed, estimated {:.1}MB output)",
        ctx.input_mb(),
        ctx.duration,
        estimate_output_mb(ctx.duration, ctx.compressed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(stage: FailureStage) -> FailureContext {
        FailureContext {
            stage,
            input_size: 12 * 1024 * 1024,
            duration: 5.0,
            compressed: true,
            abort_logged: false,
            filesystem: false,
        }
    }

    #[test]
    fn test_aborted_oom_is_process_aborted() {
        let err = classify("Aborted(OOM)", &ctx(FailureStage::Execute));
        assert_eq!(err.kind(), FailureKind::ProcessAborted);
        assert!(err.to_string().contains("12.0MB input"));
    }

    #[test]
    fn test_enoent_is_filesystem_inconsistency() {
        let err = classify(
            "FS error: ENOENT: no such file or directory",
            &ctx(FailureStage::Write),
        );
        assert_eq!(err.kind(), FailureKind::FilesystemInconsistency);
    }

    #[test]
    fn test_unrecognized_message_is_processing_failed() {
        let err = classify(
            "Invalid data found when processing input",
            &ctx(FailureStage::Execute),
        );
        assert_eq!(
            err,
            TrimError::ProcessingFailed {
                message: "Invalid data found when processing input".to_string()
            }
        );
    }

    #[test]
    fn test_memory_terms_are_resource_exhausted() {
        for message in ["Cannot allocate memory", "allocation failed", "Killed"] {
            let err = classify(message, &ctx(FailureStage::Execute));
            assert_eq!(err.kind(), FailureKind::ResourceExhausted, "{}", message);
        }
    }

    #[test]
    fn test_cancel_wins_over_other_fragments() {
        let err = classify("Operation cancelled (fs error)", &ctx(FailureStage::Execute));
        assert_eq!(err, TrimError::OperationCancelled);
    }

    #[test]
    fn test_filesystem_wins_over_abort() {
        assert_eq!(
            match_signature("EEXIST aborted"),
            FailureKind::FilesystemInconsistency
        );
    }

    #[test]
    fn test_read_stage_memory_failure_reports_estimate() {
        let err = classify("out of memory", &ctx(FailureStage::Read));
        assert_eq!(err.kind(), FailureKind::ProcessAborted);
        let message = err.to_string();
        assert!(message.contains("12.0MB input, 5.0s trimmed"));
        assert!(message.contains("estimated 0.3MB"));
    }

    #[test]
    fn test_resource_exhausted_states_size_and_duration() {
        let mut context = ctx(FailureStage::Execute);
        context.duration = 7.0;
        let err = classify("out of memory", &context);
        assert_eq!(
            err,
            TrimError::ResourceExhausted {
                input_mb: 12.0,
                duration: 7.0
            }
        );
        assert!(err.to_string().contains("12.0MB input, 7.0s trimmed"));
    }

    #[test]
    fn test_file_layer_memory_failure_is_not_a_filesystem_error() {
        let mut context = ctx(FailureStage::Read);
        context.filesystem = true;
        let err = classify("read output.mp4: Cannot allocate memory (os error 12)", &context);
        assert_eq!(err.kind(), FailureKind::ProcessAborted);
    }

    #[test]
    fn test_unrecognized_file_layer_failure_is_filesystem() {
        let mut context = ctx(FailureStage::Write);
        context.filesystem = true;
        let err = classify("write input.mp4: Permission denied", &context);
        assert_eq!(err.kind(), FailureKind::FilesystemInconsistency);
    }

    #[test]
    fn test_logged_abort_upgrades_generic_failure() {
        let mut context = ctx(FailureStage::Execute);
        context.abort_logged = true;
        let err = classify("exit code 1", &context);
        assert_eq!(err.kind(), FailureKind::ProcessAborted);
    }

    #[test]
    fn test_estimate_output_mb() {
        assert!((estimate_output_mb(10.0, false) - 1.0).abs() < 1e-9);
        assert!((estimate_output_mb(10.0, true) - 0.6).abs() < 1e-9);
    }
}
