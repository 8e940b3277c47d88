//! Generic process supervisor: spawn, redirect, monitor, stop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use civ_constants::vsock::STOP_TIMEOUT_SECS;

use crate::error::ProcessError;
use crate::naming::{log_file_path, next_slot};

/// Spawns and supervises one external process, redirecting its stdout and
/// stderr into a single per-run log file.
pub struct ProcessSupervisor {
    program: String,
    args: Vec<String>,
    env: Vec<String>,
    log_dir: PathBuf,
    slot: u64,
    child: Option<tokio::process::Child>,
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
    log_path: Option<PathBuf>,
}

impl ProcessSupervisor {
    pub fn new(program: impl Into<String>, args: Vec<String>, log_dir: PathBuf) -> Self {
        ProcessSupervisor {
            program: program.into(),
            args,
            env: Vec::new(),
            log_dir,
            slot: next_slot(),
            child: None,
            pid: None,
            alive: Arc::new(AtomicBool::new(false)),
            monitor: None,
            log_path: None,
        }
    }

    pub fn set_env(&mut self, env: Vec<String>) {
        self.env = env;
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn log_path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    /// Spawn the child, redirecting stdout/stderr into the named log file.
    /// Returns once spawn has either succeeded or failed.
    pub async fn run(&mut self) -> Result<(), ProcessError> {
        let log_path = log_file_path(&self.log_dir, &self.program, self.slot);
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|source| ProcessError::LogCreate {
                path: log_path.display().to_string(),
                source,
            })?;
        let stderr_file = log_file.try_clone().map_err(|source| ProcessError::LogCreate {
            path: log_path.display().to_string(),
            source,
        })?;

        info!(program = %self.program, args = ?self.args, "spawning co-process");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdout(log_file).stderr(stderr_file);
        for kv in &self.env {
            if let Some((k, v)) = kv.split_once('=') {
                cmd.env(k, v);
            }
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        self.pid = child.id();
        self.alive.store(true, Ordering::SeqCst);
        self.log_path = Some(log_path.clone());

        let alive = Arc::clone(&self.alive);
        let program = self.program.clone();
        self.monitor = Some(tokio::spawn(async move {
            let status = child.wait().await;
            alive.store(false, Ordering::SeqCst);
            match status {
                Ok(status) => info!(program = %program, %status, log = %log_path.display(), "co-process exited"),
                Err(e) => warn!(program = %program, error = %e, "failed to wait on co-process"),
            }
        }));

        Ok(())
    }

    /// Send SIGTERM and wait up to `STOP_TIMEOUT_SECS` for the monitor to
    /// observe exit. Never fails: a child that ignores SIGTERM is simply
    /// abandoned with a warning.
    pub async fn stop(&mut self) {
        let Some(pid) = self.pid else { return };
        if !self.running() {
            return;
        }
        info!(pid, "sending SIGTERM to co-process");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(pid, error = %e, "failed to send SIGTERM");
            return;
        }
        if let Some(handle) = self.monitor.take() {
            match tokio::time::timeout(Duration::from_secs(STOP_TIMEOUT_SECS), handle).await {
                Ok(_) => {}
                Err(_) => warn!(pid, "co-process did not exit within the stop timeout; abandoning"),
            }
        }
    }

    /// Wait for the monitor task to finish, without sending a signal first.
    pub async fn join(&mut self) {
        if let Some(handle) = self.monitor.take() {
            let _ = handle.await;
        }
    }

    pub fn running(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for ProcessSupervisor {
    /// Best-effort SIGTERM on drop. Async code must still call `stop().await`
    /// to wait for exit and release the child's wait-thread cleanly; this
    /// only guards against a handle being dropped without that call.
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            if self.running() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
    }
}
