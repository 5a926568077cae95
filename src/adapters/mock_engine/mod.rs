//! In-memory engine adapter
//!
//! Records every call, keeps virtual files in a map and can be scripted to
//! fail at any step. Used as the substitute engine in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load,
    WriteFile(String),
    DeleteFile(String),
    Exec(Vec<String>),
    ReadFile(String),
    Terminate,
}

/// Engine step that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Load,
    Write,
    Delete,
    Exec,
    Read,
}

/// Callback fired after each recorded call
pub type CallHook = Arc<dyn Fn(&EngineCall) + Send + Sync>;

struct MockState {
    files: HashMap<String, Vec<u8>>,
    calls: Vec<EngineCall>,
    loaded: bool,
    load_count: usize,
    failures: HashMap<FailPoint, DomainError>,
    output: EngineFile,
    exec_logs: Vec<String>,
    supported: bool,
    hold_load: bool,
    hold_exec: bool,
}

/// Mock engine adapter
pub struct MockEngine {
    state: Mutex<MockState>,
    hook: RwLock<Option<CallHook>>,
    log_observer: RwLock<Option<LogObserver>>,
    progress_observer: RwLock<Option<ProgressObserver>>,
    load_release: Notify,
    exec_release: Notify,
    terminated: Notify,
}

impl MockEngine {
    /// Create a mock engine whose output is four fixed bytes
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                files: HashMap::new(),
                calls: Vec::new(),
                loaded: false,
                load_count: 0,
                failures: HashMap::new(),
                output: EngineFile::Bytes(vec![1, 2, 3, 4]),
                exec_logs: Vec::new(),
                supported: true,
                hold_load: false,
                hold_exec: false,
            }),
            hook: RwLock::new(None),
            log_observer: RwLock::new(None),
            progress_observer: RwLock::new(None),
            load_release: Notify::new(),
            exec_release: Notify::new(),
            terminated: Notify::new(),
        }
    }

    /// Make `point` fail with `message`
    pub fn fail_at(&self, point: FailPoint, message: impl Into<String>) {
        self.fail_with(point, DomainError::EngineFailure(message.into()));
    }

    /// Make `point` fail with a specific error variant
    pub fn fail_with(&self, point: FailPoint, error: DomainError) {
        self.lock().failures.insert(point, error);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Payload that `exec` writes into the output slot
    pub fn set_output(&self, output: EngineFile) {
        self.lock().output = output;
    }

    /// Log lines emitted to the log observer during `exec`
    pub fn set_exec_logs(&self, lines: Vec<String>) {
        self.lock().exec_logs = lines;
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().supported = supported;
    }

    pub fn set_hook(&self, hook: CallHook) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Keep `load` pending until [`MockEngine::release_load`]
    pub fn hold_load(&self) {
        self.lock().hold_load = true;
    }

    pub fn release_load(&self) {
        self.lock().hold_load = false;
        self.load_release.notify_one();
    }

    /// Keep `exec` pending until [`MockEngine::release_exec`] or `terminate`
    pub fn hold_exec(&self) {
        self.lock().hold_exec = true;
    }

    pub fn release_exec(&self) {
        self.lock().hold_exec = false;
        self.exec_release.notify_one();
    }

    /// Place a file directly into virtual storage
    pub fn seed_file(&self, name: &str, data: Vec<u8>) {
        self.lock().files.insert(name.to_string(), data);
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    pub fn exec_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Exec(_)))
            .count()
    }

    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::WriteFile(_)))
            .count()
    }

    /// Arguments of the most recent `exec`
    pub fn last_exec_args(&self) -> Option<Vec<String>> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            EngineCall::Exec(args) => Some(args.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, then fire the hook with the state lock released
    fn record(&self, call: EngineCall) {
        self.lock().calls.push(call.clone());
        let hook = self
            .hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(&call);
        }
    }

    fn scripted_failure(&self, point: FailPoint) -> Result<(), DomainError> {
        match self.lock().failures.get(&point) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn ensure_loaded(&self) -> Result<(), DomainError> {
        if self.lock().loaded {
            Ok(())
        } else {
            Err(DomainError::EngineNotLoaded)
        }
    }

    fn emit_log(&self, line: &str) {
        let observer = self
            .log_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(line);
        }
    }

    fn emit_progress(&self, progress: EngineProgress) {
        let observer = self
            .progress_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(progress);
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> DomainError {
    DomainError::FsFail(format!("ENOENT: no such file or directory, '{}'", name))
}

#[async_trait]
impl EnginePort for MockEngine {
    async fn load(
        &self,
        _core: &EngineResource,
        _binary: &EngineResource,
    ) -> Result<(), DomainError> {
        self.record(EngineCall::Load);
        let held = self.lock().hold_load;
        if held {
            self.load_release.notified().await;
        }
        self.scripted_failure(FailPoint::Load)?;

        let mut state = self.lock();
        state.loaded = true;
        state.load_count += 1;
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), DomainError> {
        self.record(EngineCall::WriteFile(name.to_string()));
        self.ensure_loaded()?;
        self.scripted_failure(FailPoint::Write)?;
        self.lock().files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, name: &str) -> Result<(), DomainError> {
        self.record(EngineCall::DeleteFile(name.to_string()));
        self.scripted_failure(FailPoint::Delete)?;
        match self.lock().files.remove(name) {
            Some(_) => Ok(()),
            None => Err(not_found(name)),
        }
    }

    async fn exec(&self, args: &[String]) -> Result<(), DomainError> {
        self.record(EngineCall::Exec(args.to_vec()));
        self.ensure_loaded()?;

        let (held, logs) = {
            let state = self.lock();
            (state.hold_exec, state.exec_logs.clone())
        };
        if held {
            tokio::select! {
                _ = self.exec_release.notified() => {}
                _ = self.terminated.notified() => return Err(DomainError::Terminated),
            }
        }

        for line in &logs {
            self.emit_log(line);
        }
        self.emit_progress(EngineProgress::new(0.5, Some(0.5)));
        self.scripted_failure(FailPoint::Exec)?;

        let mut state = self.lock();
        if !state.files.contains_key(VirtualSlot::Input.file_name()) {
            return Err(not_found(VirtualSlot::Input.file_name()));
        }
        let output = state.output.clone().into_bytes();
        state
            .files
            .insert(VirtualSlot::Output.file_name().to_string(), output);
        drop(state);

        self.emit_progress(EngineProgress::new(1.0, None));
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<EngineFile, DomainError> {
        self.record(EngineCall::ReadFile(name.to_string()));
        self.scripted_failure(FailPoint::Read)?;
        let state = self.lock();
        let data = state.files.get(name).cloned().ok_or_else(|| not_found(name))?;
        match &state.output {
            EngineFile::Text(_) => Ok(EngineFile::Text(
                String::from_utf8_lossy(&data).into_owned(),
            )),
            EngineFile::Bytes(_) => Ok(EngineFile::Bytes(data)),
        }
    }

    async fn terminate(&self) {
        self.record(EngineCall::Terminate);
        {
            let mut state = self.lock();
            state.loaded = false;
            state.files.clear();
        }
        self.terminated.notify_waiters();
    }

    fn on_log(&self, observer: LogObserver) {
        *self
            .log_observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    fn on_progress(&self, observer: ProgressObserver) {
        *self
            .progress_observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    async fn is_supported(&self) -> bool {
        self.lock().supported
    }
}
