//! TrimX Web Library
//!
//! Orchestrates trim, crop and compress operations on a video through an
//! interruptible media engine: engine lifecycle, command planning, cleanup
//! of the engine's private storage, cancellation and failure classification.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use adapters::{MockEngine, ProcessEngine, TrimConfig};
pub use app::{CancellationFlag, EngineLifecycle, TrimInteractor, TrimService};
pub use domain::errors::DomainError;
pub use domain::model::{
    Artifact, CompressionDirective, CropRect, EngineProgress, EngineState, SourceFile, TrimOptions,
};
pub use error::{FailureKind, TrimError, TrimResult};
