//! FFmpeg process engine adapter
//!
//! Runs an ffmpeg executable as a child process. Each loaded session owns a
//! private temporary directory that serves as the virtual file namespace;
//! terminating the engine kills the running child and drops that directory.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Stderr lines kept for the failure message
const STDERR_TAIL_LINES: usize = 8;

/// Flags prepended to every command so progress arrives on stdout
const PROCESS_FLAGS: &[&str] = &["-hide_banner", "-nostdin", "-nostats", "-progress", "pipe:1"];

/// Aborts the supervising task, and with it the child, when `exec` is dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Clone)]
struct Session {
    executable: PathBuf,
    workdir: Arc<TempDir>,
}

/// FFmpeg process engine
pub struct ProcessEngine {
    session: Mutex<Option<Session>>,
    default_program: String,
    log_observer: RwLock<Option<LogObserver>>,
    progress_observer: RwLock<Option<ProgressObserver>>,
    terminations: watch::Sender<u64>,
}

impl ProcessEngine {
    /// Create an unloaded engine; `default_program` is used by the support
    /// check before anything is loaded.
    pub fn new(default_program: impl Into<String>) -> Self {
        let (terminations, _) = watch::channel(0);
        Self {
            session: Mutex::new(None),
            default_program: default_program.into(),
            log_observer: RwLock::new(None),
            progress_observer: RwLock::new(None),
            terminations,
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<Session, DomainError> {
        self.lock_session()
            .clone()
            .ok_or(DomainError::EngineNotLoaded)
    }

    fn slot_path(&self, name: &str) -> Result<PathBuf, DomainError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(DomainError::BadArgs(format!("Invalid virtual file name: {}", name)));
        }
        Ok(self.session()?.workdir.path().join(name))
    }

    fn log_observer(&self) -> Option<LogObserver> {
        self.log_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn progress_observer(&self) -> Option<ProgressObserver> {
        self.progress_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Self-hosted paths are made absolute since children run inside the workspace
async fn executable_path(resource: &EngineResource) -> PathBuf {
    match &resource.location {
        ResourceLocation::SelfHosted(path) => tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.clone()),
        ResourceLocation::Fallback(program) => PathBuf::from(program),
    }
}

/// Run `<program> -version`; returns the first output line
async fn probe_version(program: &Path) -> Result<String, DomainError> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            DomainError::EngineFailure(format!("Failed to start {}: {}", program.display(), e))
        })?;

    if !output.status.success() {
        return Err(DomainError::EngineFailure(format!(
            "{} -version exited with {}",
            program.display(),
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}

/// Value of `-t` in the argument list
fn requested_duration(args: &[String]) -> Option<f64> {
    args.windows(2)
        .find(|w| w[0] == "-t")
        .and_then(|w| w[1].parse::<f64>().ok())
        .filter(|d| *d > 0.0)
}

/// Parse one `-progress` line into seconds of output produced
fn progress_seconds(line: &str) -> Option<f64> {
    // out_time_ms is reported in microseconds as well
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse::<f64>().ok().map(|us| us / 1_000_000.0)
}

async fn pump_progress(
    stdout: Option<ChildStdout>,
    duration: Option<f64>,
    observer: Option<ProgressObserver>,
) {
    let Some(stdout) = stdout else { return };
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let (Some(observer), Some(total)) = (&observer, duration) else {
            continue;
        };
        if let Some(seconds) = progress_seconds(&line) {
            observer(EngineProgress::new(seconds / total, Some(seconds)));
        } else if line == "progress=end" {
            observer(EngineProgress::new(1.0, Some(total)));
        }
    }
}

async fn pump_stderr(stderr: Option<ChildStderr>, observer: Option<LogObserver>) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let Some(stderr) = stderr else {
        return Vec::new();
    };
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(observer) = &observer {
            observer(&line);
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect()
}

#[async_trait]
impl EnginePort for ProcessEngine {
    async fn load(
        &self,
        core: &EngineResource,
        binary: &EngineResource,
    ) -> Result<(), DomainError> {
        let executable = executable_path(core).await;
        let version = probe_version(&executable).await?;
        // The companion tool ships with the same toolchain; refuse a partial install
        probe_version(&executable_path(binary).await).await?;

        let workdir = tempfile::Builder::new()
            .prefix("trimx-web-")
            .tempdir()
            .map_err(|e| DomainError::FsFail(format!("Failed to create engine workspace: {}", e)))?;

        info!(
            executable = %executable.display(),
            workspace = %workdir.path().display(),
            "{}",
            version
        );
        *self.lock_session() = Some(Session {
            executable,
            workdir: Arc::new(workdir),
        });
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), DomainError> {
        let path = self.slot_path(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| DomainError::FsFail(format!("write {}: {}", name, e)))
    }

    async fn delete_file(&self, name: &str) -> Result<(), DomainError> {
        let path = self.slot_path(name)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::FsFail(format!("ENOENT: {}", name))
            } else {
                DomainError::FsFail(format!("delete {}: {}", name, e))
            }
        })
    }

    async fn exec(&self, args: &[String]) -> Result<(), DomainError> {
        let session = self.session()?;
        let mut terminated = self.terminations.subscribe();

        let mut child = Command::new(&session.executable)
            .current_dir(session.workdir.path())
            .args(PROCESS_FLAGS)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::EngineFailure(format!("Failed to start engine: {}", e)))?;
        debug!(pid = ?child.id(), "Engine process started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let progress = pump_progress(stdout, requested_duration(args), self.progress_observer());
        let logs = pump_stderr(stderr, self.log_observer());

        // The child is supervised on its own task so termination kills it
        // even while the caller is not polling this future.
        let mut supervisor = AbortOnDrop(tokio::spawn(async move {
            let run = async {
                let (status, _, tail) = tokio::join!(child.wait(), progress, logs);
                (status, tail)
            };
            tokio::select! {
                finished = run => Some(finished),
                _ = terminated.changed() => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill engine process: {}", e);
                    }
                    None
                }
            }
        }));

        let outcome = (&mut supervisor.0).await.map_err(|e| {
            DomainError::EngineFailure(format!("Engine supervisor failed: {}", e))
        })?;
        let Some((status, tail)) = outcome else {
            warn!("Engine process terminated");
            return Err(DomainError::Terminated);
        };

        let status = status.map_err(|e| DomainError::EngineFailure(e.to_string()))?;
        if status.success() {
            return Ok(());
        }

        let cause = match status.code() {
            Some(code) => format!("exited with code {}", code),
            None => "was killed by a signal".to_string(),
        };
        Err(DomainError::EngineFailure(format!(
            "ffmpeg {}: {}",
            cause,
            tail.join("\n")
        )))
    }

    async fn read_file(&self, name: &str) -> Result<EngineFile, DomainError> {
        let path = self.slot_path(name)?;
        tokio::fs::read(&path)
            .await
            .map(EngineFile::Bytes)
            .map_err(|e| DomainError::FsFail(format!("read {}: {}", name, e)))
    }

    async fn terminate(&self) {
        let previous = self.lock_session().take();
        self.terminations.send_modify(|generation| *generation += 1);
        if previous.is_some() {
            info!("Engine session destroyed");
        }
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
        let program = match self.lock_session().as_ref() {
            Some(session) => session.executable.clone(),
            None => PathBuf::from(&self.default_program),
        };
        match probe_version(&program).await {
            Ok(version) => {
                debug!("Engine supported: {}", version);
                true
            }
            Err(e) => {
                debug!("Engine not supported: {}", e);
                false
            }
        }
    }
}
