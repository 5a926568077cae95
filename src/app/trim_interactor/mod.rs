// Trim interactor - Orchestrates one trim operation through the engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::app::lifecycle::EngineLifecycle;
use crate::domain::classify::{classify, FailureContext, FailureStage};
use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::domain::rules::{CommandPlan, CommandPlanner};
use crate::error::{TrimError, TrimResult};
use crate::ports::EnginePort;

/// Default grace period between execution and reading the output
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Cooperative cancellation signal polled at every checkpoint
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the pipeline stopped before producing output
enum Interrupted {
    Cancelled,
    Engine(DomainError),
}

impl From<DomainError> for Interrupted {
    fn from(err: DomainError) -> Self {
        Interrupted::Engine(err)
    }
}

/// Interactor for the trim use case.
///
/// Not reentrant: exactly one `run` may be in flight.
pub struct TrimInteractor {
    lifecycle: Arc<EngineLifecycle>,
    planner: CommandPlanner,
    settle_delay: Duration,
    cancelled: Arc<CancellationFlag>,
}

impl TrimInteractor {
    /// Create new trim interactor around a lifecycle manager
    pub fn new(lifecycle: Arc<EngineLifecycle>, planner: CommandPlanner) -> Self {
        Self {
            lifecycle,
            planner,
            settle_delay: DEFAULT_SETTLE_DELAY,
            cancelled: Arc::new(CancellationFlag::new()),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn lifecycle(&self) -> &Arc<EngineLifecycle> {
        &self.lifecycle
    }

    /// Shared handle to the cancellation flag
    pub fn cancellation(&self) -> Arc<CancellationFlag> {
        Arc::clone(&self.cancelled)
    }

    /// Trim `file` according to `options`
    pub async fn run(&self, file: &SourceFile, options: &TrimOptions) -> TrimResult<Artifact> {
        self.cancelled.reset();
        self.lifecycle.diagnostics().reset();

        // Invalid requests never reach the engine
        let plan = self.planner.plan(file.size(), options)?;

        if !self.lifecycle.is_loaded() {
            info!("Engine not loaded, initializing before trim");
            self.lifecycle.initialize().await?;
        }

        info!(
            file = %file.name,
            size = file.size(),
            start = options.start_time,
            duration = options.duration,
            "Starting trim operation"
        );
        let started = Instant::now();
        let engine = self.lifecycle.engine().as_ref();
        let mut stage = FailureStage::Prepare;

        match self.drive(engine, file, &plan, &mut stage).await {
            Ok(bytes) => {
                info!(
                    output_size = bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Trim completed"
                );
                Ok(Artifact::video(bytes))
            }
            Err(interrupted) => {
                self.remove_slots(engine).await;
                Err(self.diagnose(interrupted, stage, file, options, &plan))
            }
        }
    }

    /// Request checkpoint cancellation; takes effect at the next checkpoint
    pub fn cancel(&self) {
        self.cancelled.set();
        info!("Cancel requested - operation will stop at next checkpoint");
    }

    /// Cancel by terminating the engine, then reload it.
    ///
    /// The in-flight `run` resolves to [`TrimError::OperationCancelled`].
    pub async fn abort(&self) -> TrimResult<()> {
        self.cancelled.set();
        warn!("Terminating engine to abort the running operation");
        self.lifecycle.engine().terminate().await;
        self.lifecycle.reinitialize_after_termination().await
    }

    async fn drive(
        &self,
        engine: &dyn EnginePort,
        file: &SourceFile,
        plan: &CommandPlan,
        stage: &mut FailureStage,
    ) -> Result<Vec<u8>, Interrupted> {
        let input = VirtualSlot::Input.file_name();
        let output = VirtualSlot::Output.file_name();

        self.clear_stale_slots(engine).await;
        self.checkpoint("before write")?;

        *stage = FailureStage::Write;
        engine.write_file(input, file.bytes()).await?;
        self.checkpoint("after write")?;

        info!(command = %plan.display(), "Executing engine command");
        self.checkpoint("before execute")?;

        *stage = FailureStage::Execute;
        engine.exec(&plan.args).await?;
        self.checkpoint("after execute")?;

        tokio::time::sleep(self.settle_delay).await;
        self.checkpoint("after settle")?;

        *stage = FailureStage::Read;
        let data = engine.read_file(output).await?.into_bytes();
        if self.lifecycle.diagnostics().finalize_started() {
            debug!("Output went through the finalize pass");
        }

        self.remove_slots(engine).await;
        Ok(data)
    }

    fn checkpoint(&self, point: &'static str) -> Result<(), Interrupted> {
        if self.cancelled.is_set() {
            info!(checkpoint = point, "Operation cancelled");
            return Err(Interrupted::Cancelled);
        }
        Ok(())
    }

    /// A previous operation may have left orphaned slots behind
    async fn clear_stale_slots(&self, engine: &dyn EnginePort) {
        for slot in VirtualSlot::ALL {
            if let Err(e) = engine.delete_file(slot.file_name()).await {
                debug!(slot = slot.file_name(), "No stale slot to clear: {}", e);
            }
        }
    }

    /// Best-effort; never masks the primary error
    async fn remove_slots(&self, engine: &dyn EnginePort) {
        for slot in VirtualSlot::ALL {
            if let Err(e) = engine.delete_file(slot.file_name()).await {
                debug!(slot = slot.file_name(), "Ignoring cleanup failure: {}", e);
            }
        }
    }

    fn diagnose(
        &self,
        interrupted: Interrupted,
        stage: FailureStage,
        file: &SourceFile,
        options: &TrimOptions,
        plan: &CommandPlan,
    ) -> TrimError {
        let failure = match interrupted {
            Interrupted::Cancelled => return TrimError::OperationCancelled,
            // Termination surfaces as an engine error; the flag tells us it was requested
            Interrupted::Engine(_) if self.cancelled.is_set() => {
                info!("Engine failure after cancellation request, reporting cancellation");
                return TrimError::OperationCancelled;
            }
            Interrupted::Engine(e) => e,
        };

        let ctx = FailureContext {
            stage,
            input_size: file.size(),
            duration: options.duration,
            compressed: plan.decision.encoding.is_compressed(),
            abort_logged: self.lifecycle.diagnostics().abort_line().is_some(),
            filesystem: matches!(failure, DomainError::FsFail(_)),
        };
        let classified = classify(&failure.message(), &ctx);
        error!(
            stage = ?stage,
            kind = ?classified.kind(),
            command = %plan.display(),
            "Trim failed: {}",
            failure.message()
        );
        classified
    }
}
