use std::sync::Arc;

use crate::adapters::{LocalFirstResources, ProcessEngine, TrimConfig};
use crate::app::lifecycle::EngineLifecycle;
use crate::app::trim_interactor::{CancellationFlag, TrimInteractor};
use crate::domain::model::*;
use crate::domain::rules::CommandPlanner;
use crate::error::TrimResult;
use crate::ports::{EnginePort, ProgressObserver, ResourcePort};

/// Session-wide facade exposed to a UI or CLI driver.
///
/// Owns one engine through its lifecycle manager and one trim interactor.
pub struct TrimService {
    interactor: TrimInteractor,
}

impl TrimService {
    /// Wire a service around explicit engine and resource ports
    pub fn new(
        engine: Arc<dyn EnginePort>,
        resources: Arc<dyn ResourcePort>,
        config: &TrimConfig,
    ) -> Self {
        let lifecycle = Arc::new(EngineLifecycle::new(
            engine,
            resources,
            config.resource_names(),
        ));
        let planner = CommandPlanner::new(config.planner_limits());
        let interactor =
            TrimInteractor::new(lifecycle, planner).with_settle_delay(config.settle_delay());
        Self { interactor }
    }

    /// Service backed by an ffmpeg child process
    pub fn with_process_engine(config: &TrimConfig) -> Self {
        let engine = Arc::new(ProcessEngine::new(config.engine.core_resource.clone()));
        let resources = Arc::new(LocalFirstResources::new(
            config.engine.self_hosted_dir.clone(),
            config.engine.fallback_base.clone(),
        ));
        Self::new(engine, resources, config)
    }

    pub async fn initialize(&self) -> TrimResult<()> {
        self.interactor.lifecycle().initialize().await
    }

    pub async fn run(&self, file: &SourceFile, options: &TrimOptions) -> TrimResult<Artifact> {
        self.interactor.run(file, options).await
    }

    /// Checkpoint-style cancellation
    pub fn cancel(&self) {
        self.interactor.cancel();
    }

    /// Terminate-style cancellation; reloads the engine afterwards
    pub async fn abort(&self) -> TrimResult<()> {
        self.interactor.abort().await
    }

    pub fn cancellation(&self) -> Arc<CancellationFlag> {
        self.interactor.cancellation()
    }

    pub fn on_progress(&self, callback: ProgressObserver) {
        self.interactor.lifecycle().on_progress(callback);
    }

    pub fn load_status(&self) -> EngineState {
        self.interactor.lifecycle().status()
    }

    pub fn is_loaded(&self) -> bool {
        self.interactor.lifecycle().is_loaded()
    }

    pub fn load_progress(&self) -> f64 {
        self.interactor.lifecycle().progress()
    }

    pub async fn is_supported(&self) -> bool {
        self.interactor.lifecycle().is_supported().await
    }
}
