//! Subprocess lifecycle management shared across the workspace.
//!
//! Provides:
//! - [`SpawnSpec`] / [`Launcher`]: a seam between "what to run" and the OS,
//!   so tests can supervise fake children without spawning real processes
//! - [`ProcessSupervisor`]: graceful stop (quit signal, bounded wait,
//!   escalate to kill) and liveness polling for a single child
//! - [`ProcessRegistry`]: a mutex-guarded broadcast-id -> process map, one
//!   instance per concern, never shared between concerns

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn tokio_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.no_window();
    cmd
}

/// Errors from process supervision.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("process IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Exit information for a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Description of a subprocess to launch.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes written to the child's stdin to request a graceful quit
    /// (ffmpeg accepts `q`). Stdin is only piped when this is set.
    pub quit_command: Option<Vec<u8>>,
    /// Extra environment variables.
    pub envs: Vec<(String, String)>,
}

impl SpawnSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            quit_command: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn quit_command(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.quit_command = Some(bytes.into());
        self
    }
}

/// A running child process as seen by the supervisor.
///
/// Implemented by real OS children and by in-memory fakes in tests.
#[async_trait]
pub trait Supervised: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Ask the child to quit gracefully. Best effort.
    async fn signal_quit(&mut self) -> io::Result<()>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ExitInfo>>;

    /// Wait for the child to exit.
    async fn wait(&mut self) -> io::Result<ExitInfo>;

    /// Forcibly terminate the child.
    async fn kill(&mut self) -> io::Result<()>;
}

/// Launches children from a [`SpawnSpec`].
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, spec: &SpawnSpec) -> Result<Box<dyn Supervised>>;
}

/// Real launcher backed by `tokio::process::Command`.
///
/// Child stdout/stderr are discarded; stdin is piped only when the spec
/// carries a quit command.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(&self, spec: &SpawnSpec) -> Result<Box<dyn Supervised>> {
        let mut cmd = tokio_command(&spec.program);
        cmd.args(&spec.args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .stdin(if spec.quit_command.is_some() {
                std::process::Stdio::piped()
            } else {
                std::process::Stdio::null()
            })
            .kill_on_drop(true);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let stdin = child.stdin.take();

        debug!(program = %spec.program, pid = ?child.id(), "spawned subprocess");

        Ok(Box::new(CommandChild {
            child,
            stdin,
            quit_command: spec.quit_command.clone(),
        }))
    }
}

struct CommandChild {
    child: tokio::process::Child,
    stdin: Option<tokio::process::ChildStdin>,
    quit_command: Option<Vec<u8>>,
}

#[async_trait]
impl Supervised for CommandChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn signal_quit(&mut self) -> io::Result<()> {
        if let (Some(mut stdin), Some(quit)) = (self.stdin.take(), self.quit_command.as_deref()) {
            stdin.write_all(quit).await?;
            stdin.flush().await?;
            // Dropping stdin closes the pipe; EOF doubles as a quit signal.
        }
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitInfo>> {
        Ok(self.child.try_wait()?.map(|status| ExitInfo {
            code: status.code(),
        }))
    }

    async fn wait(&mut self) -> io::Result<ExitInfo> {
        let status = self.child.wait().await?;
        Ok(ExitInfo {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

/// Outcome of a supervised stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period after the quit signal.
    Exited(ExitInfo),
    /// Had already exited before the stop was requested.
    AlreadyExited(ExitInfo),
    /// Did not exit in time and was forcibly killed.
    Killed,
}

/// Supervises one spawned child: liveness polling and graceful stop.
pub struct ProcessSupervisor {
    child: Box<dyn Supervised>,
    program: String,
}

impl ProcessSupervisor {
    pub fn new(child: Box<dyn Supervised>, program: impl Into<String>) -> Self {
        Self {
            child,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking liveness check.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Non-blocking exit check.
    pub fn try_exit(&mut self) -> Option<ExitInfo> {
        self.child.try_wait().ok().flatten()
    }

    /// Stop the child: quit signal, wait up to `grace`, then kill.
    pub async fn stop(&mut self, grace: Duration) -> Result<StopOutcome> {
        if let Some(exit) = self.child.try_wait()? {
            return Ok(StopOutcome::AlreadyExited(exit));
        }

        if let Err(e) = self.child.signal_quit().await {
            debug!(program = %self.program, error = %e, "quit signal failed, will escalate");
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(exit)) => {
                debug!(program = %self.program, code = ?exit.code, "subprocess exited gracefully");
                Ok(StopOutcome::Exited(exit))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(
                    program = %self.program,
                    pid = ?self.child.id(),
                    grace_ms = grace.as_millis() as u64,
                    "subprocess did not exit within grace period, killing"
                );
                self.child.kill().await?;
                // Reap so the OS entry is released.
                let _ = self.child.wait().await;
                Ok(StopOutcome::Killed)
            }
        }
    }
}

/// Per-concern process table: broadcast id -> supervised process.
///
/// Each concern (composition, audio mix, recording) owns its own registry.
/// Callers serialize mutations per broadcast id; the internal mutex only
/// protects the map itself and is never held across an await.
pub struct ProcessRegistry {
    concern: &'static str,
    inner: Mutex<HashMap<String, ProcessSupervisor>>,
}

impl ProcessRegistry {
    pub fn new(concern: &'static str) -> Self {
        Self {
            concern,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn concern(&self) -> &'static str {
        self.concern
    }

    /// Register a process, returning any displaced entry for the same id.
    ///
    /// The caller must stop the displaced process; the registry never holds
    /// two processes for one broadcast.
    #[must_use = "a displaced process must be stopped by the caller"]
    pub fn insert(&self, broadcast_id: impl Into<String>, sup: ProcessSupervisor) -> Option<ProcessSupervisor> {
        self.inner.lock().insert(broadcast_id.into(), sup)
    }

    pub fn remove(&self, broadcast_id: &str) -> Option<ProcessSupervisor> {
        self.inner.lock().remove(broadcast_id)
    }

    pub fn contains(&self, broadcast_id: &str) -> bool {
        self.inner.lock().contains_key(broadcast_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Broadcast ids with a registered process.
    pub fn active_ids(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Remove entries whose process exited on its own (crash or natural
    /// completion). Returns the reaped ids with their exit info.
    pub fn reap_finished(&self) -> Vec<(String, ExitInfo)> {
        let mut guard = self.inner.lock();
        let finished: Vec<(String, ExitInfo)> = guard
            .iter_mut()
            .filter_map(|(id, sup)| sup.try_exit().map(|exit| (id.clone(), exit)))
            .collect();
        for (id, exit) in &finished {
            guard.remove(id);
            debug!(concern = self.concern, broadcast_id = %id, code = ?exit.code, "reaped finished subprocess");
        }
        finished
    }

    /// Stop and deregister the process for a broadcast, if any.
    pub async fn stop(&self, broadcast_id: &str, grace: Duration) -> Result<Option<StopOutcome>> {
        // Taken out of the map before the await; per-broadcast serialization
        // upstream prevents a concurrent insert for the same id.
        let Some(mut sup) = self.remove(broadcast_id) else {
            return Ok(None);
        };
        let outcome = sup.stop(grace).await?;
        debug!(concern = self.concern, broadcast_id = %broadcast_id, ?outcome, "stopped subprocess");
        Ok(Some(outcome))
    }

    /// Stop every registered process. Returns how many were stopped.
    pub async fn stop_all(&self, grace: Duration) -> usize {
        let ids = self.active_ids();
        let mut stopped = 0;
        for id in ids {
            match self.stop(&id, grace).await {
                Ok(Some(_)) => stopped += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(concern = self.concern, broadcast_id = %id, error = %e, "failed to stop subprocess");
                }
            }
        }
        stopped
    }
}
