// Ports - Interface definitions (contracts)

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Observer for engine log lines
pub type LogObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Observer for engine progress updates
pub type ProgressObserver = Arc<dyn Fn(EngineProgress) + Send + Sync>;

/// Where an engine resource was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    /// Self-hosted copy next to the application
    SelfHosted(PathBuf),
    /// Fallback location (remote URL or program name, depending on the engine)
    Fallback(String),
}

/// One of the two resources the engine needs to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResource {
    pub name: String,
    pub location: ResourceLocation,
}

/// Port for the embedded media-processing engine.
///
/// One instance lives for the whole session. Methods take `&self` so that
/// `terminate` can be called while `exec` is in flight.
#[async_trait]
pub trait EnginePort: Send + Sync {
    /// One-time heavy initialization
    async fn load(&self, core: &EngineResource, binary: &EngineResource)
        -> Result<(), DomainError>;

    /// Write bytes into a virtual file
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), DomainError>;

    /// Delete a virtual file; a missing file may be reported as an error
    async fn delete_file(&self, name: &str) -> Result<(), DomainError>;

    /// Run one command; not independently cancelable
    async fn exec(&self, args: &[String]) -> Result<(), DomainError>;

    /// Read a virtual file as bytes or text
    async fn read_file(&self, name: &str) -> Result<EngineFile, DomainError>;

    /// Destroy all engine state; a full `load` is required afterwards
    async fn terminate(&self);

    /// Replace the log line observer
    fn on_log(&self, observer: LogObserver);

    /// Replace the progress observer
    fn on_progress(&self, observer: ProgressObserver);

    /// Whether the host can run this engine at all
    async fn is_supported(&self) -> bool;
}

/// Port for acquiring engine resources
#[async_trait]
pub trait ResourcePort: Send + Sync {
    /// Locate the named resource, preferring the self-hosted source
    async fn acquire(&self, name: &str) -> Result<EngineResource, DomainError>;
}
