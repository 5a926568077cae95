// Engine lifecycle - Owns the single engine instance for the session

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::error::{TrimError, TrimResult};
use crate::ports::*;

/// Log fragments that mark the second-stage finalize pass
const FINALIZE_MARKERS: &[&str] = &["moov atom", "second pass"];

/// What the engine's log lines revealed during the current operation
#[derive(Debug, Default)]
pub struct EngineDiagnostics {
    finalize_started: AtomicBool,
    abort_line: Mutex<Option<String>>,
}

impl EngineDiagnostics {
    /// Inspect one engine log line
    pub fn observe(&self, line: &str) {
        let lowered = line.to_lowercase();
        if FINALIZE_MARKERS.iter().any(|m| lowered.contains(m))
            && !self.finalize_started.swap(true, Ordering::SeqCst)
        {
            info!("Engine started the finalize pass");
        }
        if lowered.contains("abort") {
            warn!(line, "Engine reported an abort");
            *self.lock_abort() = Some(line.to_string());
        }
    }

    pub fn finalize_started(&self) -> bool {
        self.finalize_started.load(Ordering::SeqCst)
    }

    pub fn abort_line(&self) -> Option<String> {
        self.lock_abort().clone()
    }

    /// Forget everything observed so far; called at the start of each operation
    pub fn reset(&self) {
        self.finalize_started.store(false, Ordering::SeqCst);
        *self.lock_abort() = None;
    }

    fn lock_abort(&self) -> MutexGuard<'_, Option<String>> {
        self.abort_line.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct LifecycleState {
    status: EngineState,
    load_progress: f64,
}

/// Names of the two resources the engine loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub core: String,
    pub binary: String,
}

/// Engine lifecycle manager
///
/// Tracks `unloaded -> loading -> loaded | error`, loads the engine at most
/// once per session and reloads it after a forced termination.
pub struct EngineLifecycle {
    engine: Arc<dyn EnginePort>,
    resources: Arc<dyn ResourcePort>,
    names: ResourceNames,
    state: Mutex<LifecycleState>,
    progress_callback: Arc<RwLock<Option<ProgressObserver>>>,
    diagnostics: Arc<EngineDiagnostics>,
}

impl EngineLifecycle {
    /// Create a lifecycle manager around an engine that has not been loaded yet
    pub fn new(
        engine: Arc<dyn EnginePort>,
        resources: Arc<dyn ResourcePort>,
        names: ResourceNames,
    ) -> Self {
        Self {
            engine,
            resources,
            names,
            state: Mutex::new(LifecycleState {
                status: EngineState::Unloaded,
                load_progress: 0.0,
            }),
            progress_callback: Arc::new(RwLock::new(None)),
            diagnostics: Arc::new(EngineDiagnostics::default()),
        }
    }

    /// Load the engine unless it is already loaded.
    ///
    /// Fails fast with [`TrimError::AlreadyInLoadProgress`] when another load
    /// is in flight.
    pub async fn initialize(&self) -> TrimResult<()> {
        {
            let mut state = self.lock_state();
            match state.status {
                EngineState::Loaded => return Ok(()),
                EngineState::Loading => return Err(TrimError::AlreadyInLoadProgress),
                EngineState::Unloaded | EngineState::Error => {}
            }
            state.status = EngineState::Loading;
            state.load_progress = 0.0;
        }

        info!("Loading processing engine");
        self.register_observers();

        match self.load_engine().await {
            Ok(()) => {
                let mut state = self.lock_state();
                state.status = EngineState::Loaded;
                state.load_progress = 1.0;
                info!("Processing engine loaded");
                Ok(())
            }
            Err(e) => {
                self.lock_state().status = EngineState::Error;
                error!("Failed to load engine: {}", e);
                Err(TrimError::InitializationFailed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Reload after the engine was forcibly terminated.
    ///
    /// When the reload fails the state is left `unloaded`, so the next
    /// operation retries the load instead of failing forever.
    pub async fn reinitialize_after_termination(&self) -> TrimResult<()> {
        {
            let mut state = self.lock_state();
            if state.status == EngineState::Loading {
                return Err(TrimError::AlreadyInLoadProgress);
            }
            state.status = EngineState::Unloaded;
            state.load_progress = 0.0;
        }

        info!("Reinitializing engine after termination");
        let result = self.initialize().await;
        if let Err(e) = &result {
            warn!("Engine reload failed, next operation will retry: {}", e);
            let mut state = self.lock_state();
            if state.status == EngineState::Error {
                state.status = EngineState::Unloaded;
            }
        }
        result
    }

    pub fn status(&self) -> EngineState {
        self.lock_state().status
    }

    pub fn is_loaded(&self) -> bool {
        self.status() == EngineState::Loaded
    }

    /// Load progress in [0, 1]
    pub fn progress(&self) -> f64 {
        self.lock_state().load_progress
    }

    /// Replace the caller's progress subscriber
    pub fn on_progress(&self, callback: ProgressObserver) {
        *self
            .progress_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn engine(&self) -> &Arc<dyn EnginePort> {
        &self.engine
    }

    pub fn diagnostics(&self) -> &EngineDiagnostics {
        &self.diagnostics
    }

    /// Capability check; does not require the engine to be loaded
    pub async fn is_supported(&self) -> bool {
        self.engine.is_supported().await
    }

    async fn load_engine(&self) -> Result<(), DomainError> {
        let core = self.resources.acquire(&self.names.core).await?;
        let binary = self.resources.acquire(&self.names.binary).await?;
        debug!(core = ?core.location, binary = ?binary.location, "Engine resources acquired");
        self.engine.load(&core, &binary).await
    }

    fn register_observers(&self) {
        let diagnostics = Arc::clone(&self.diagnostics);
        self.engine.on_log(Arc::new(move |line: &str| {
            debug!(target: "trimx_web::engine", "{}", line);
            diagnostics.observe(line);
        }));

        let callback = Arc::clone(&self.progress_callback);
        self.engine.on_progress(Arc::new(move |progress: EngineProgress| {
            let subscriber = callback
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(subscriber) = subscriber {
                subscriber(progress);
            }
        }));
    }

    fn lock_state(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
