//! Variant co-process wrappers over [`ProcessSupervisor`].

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use civ_constants::paths::{RPMB_DATA_FILE, RPMB_SOCK_FILE, VTPM_SOCK_FILE};

use crate::error::ProcessError;
use crate::supervisor::ProcessSupervisor;

/// Common operations every managed co-process supports.
#[async_trait]
pub trait CoProcess: Send {
    async fn run(&mut self) -> Result<(), ProcessError>;
    async fn stop(&mut self);
    async fn join(&mut self);
    fn running(&self) -> bool;
}

/// Runs exactly the given command with no special lifecycle handling.
pub struct GenericCoProcess {
    inner: ProcessSupervisor,
}

impl GenericCoProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>, log_dir: PathBuf) -> Self {
        GenericCoProcess {
            inner: ProcessSupervisor::new(program, args, log_dir),
        }
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.inner.set_env(env);
        self
    }
}

#[async_trait]
impl CoProcess for GenericCoProcess {
    async fn run(&mut self) -> Result<(), ProcessError> {
        self.inner.run().await
    }
    async fn stop(&mut self) {
        self.inner.stop().await
    }
    async fn join(&mut self) {
        self.inner.join().await
    }
    fn running(&self) -> bool {
        self.inner.running()
    }
}

/// Storage-key ("rpmb") helper: lazily initializes its backing file on
/// first run, and cleans up its control socket on stop (`rpmb_dev` leaves
/// it behind).
pub struct RpmbCoProcess {
    bin_path: String,
    data_dir: PathBuf,
    log_dir: PathBuf,
    inner: Option<ProcessSupervisor>,
}

impl RpmbCoProcess {
    pub fn new(bin_path: impl Into<String>, data_dir: PathBuf, log_dir: PathBuf) -> Self {
        RpmbCoProcess {
            bin_path: bin_path.into(),
            data_dir,
            log_dir,
            inner: None,
        }
    }

    fn data_file(&self) -> PathBuf {
        self.data_dir.join(RPMB_DATA_FILE)
    }

    fn sock_file(&self) -> PathBuf {
        self.data_dir.join(RPMB_SOCK_FILE)
    }
}

#[async_trait]
impl CoProcess for RpmbCoProcess {
    async fn run(&mut self) -> Result<(), ProcessError> {
        let data_file = self.data_file();
        if !data_file.exists() {
            info!(path = %data_file.display(), "initializing RPMB backing store");
            let mut init = ProcessSupervisor::new(
                self.bin_path.clone(),
                vec![
                    "--dev".into(),
                    data_file.display().to_string(),
                    "--init".into(),
                    "--size".into(),
                    "2048".into(),
                ],
                self.log_dir.clone(),
            );
            // Best-effort: init's exit code carries no recoverable signal here.
            if let Err(e) = init.run().await {
                warn!(error = %e, "RPMB init run failed to spawn; continuing anyway");
            } else {
                init.join().await;
            }
        }

        let mut supervisor = ProcessSupervisor::new(
            self.bin_path.clone(),
            vec![
                "--dev".into(),
                data_file.display().to_string(),
                "--sock".into(),
                self.sock_file().display().to_string(),
            ],
            self.log_dir.clone(),
        );
        supervisor.run().await?;
        self.inner = Some(supervisor);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.stop().await;
        }
        let sock = self.sock_file();
        if sock.exists() {
            info!(path = %sock.display(), "removing leftover RPMB socket");
            let _ = std::fs::remove_file(&sock);
        }
    }

    async fn join(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.join().await;
        }
    }

    fn running(&self) -> bool {
        self.inner.as_ref().is_some_and(ProcessSupervisor::running)
    }
}

/// Virtual TPM helper: refuses to start if its data directory is absent.
pub struct VtpmCoProcess {
    bin_path: String,
    data_dir: PathBuf,
    log_dir: PathBuf,
    inner: Option<ProcessSupervisor>,
}

impl VtpmCoProcess {
    pub fn new(bin_path: impl Into<String>, data_dir: PathBuf, log_dir: PathBuf) -> Self {
        VtpmCoProcess {
            bin_path: bin_path.into(),
            data_dir,
            log_dir,
            inner: None,
        }
    }
}

#[async_trait]
impl CoProcess for VtpmCoProcess {
    async fn run(&mut self) -> Result<(), ProcessError> {
        if !self.data_dir.is_dir() {
            return Err(ProcessError::DataDirMissing(self.data_dir.display().to_string()));
        }
        let sock = self.data_dir.join(VTPM_SOCK_FILE);
        let mut supervisor = ProcessSupervisor::new(
            self.bin_path.clone(),
            vec![
                "socket".into(),
                "--tpmstate".into(),
                format!("dir={}", self.data_dir.display()),
                "--tpm2".into(),
                "--ctrl".into(),
                format!("type=unixio,path={}", sock.display()),
            ],
            self.log_dir.clone(),
        );
        supervisor.run().await?;
        self.inner = Some(supervisor);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.stop().await;
        }
    }

    async fn join(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.join().await;
        }
    }

    fn running(&self) -> bool {
        self.inner.as_ref().is_some_and(ProcessSupervisor::running)
    }
}
