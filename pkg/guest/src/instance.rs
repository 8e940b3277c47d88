//! A single guest's state machine: config, allocated CID, main emulator,
//! co-processes, and the end-call teardown queue.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{info, warn};

use civ_argbuilder::CoProcSpec;
use civ_cid::CidPool;
use civ_config::GuestConfig;
use civ_hostdev::EndCallQueue;
use civ_process::{CoProcess, GenericCoProcess, ProcessSupervisor, RpmbCoProcess, VtpmCoProcess};

use crate::error::GuestError;
use crate::state::GuestState;

struct EmulatorPlan {
    path: String,
    args: Vec<String>,
}

/// Owns everything needed to boot, run, and tear down one guest.
pub struct GuestInstance {
    name: String,
    config_path: PathBuf,
    config_dir: PathBuf,
    log_dir: PathBuf,
    state: Mutex<GuestState>,
    cid: Mutex<Option<u32>>,
    plan: Mutex<Option<EmulatorPlan>>,
    coproc_specs: Mutex<Vec<CoProcSpec>>,
    coprocs: Mutex<Vec<Box<dyn CoProcess>>>,
    main: Mutex<Option<ProcessSupervisor>>,
    queue: Mutex<EndCallQueue>,
}

impl GuestInstance {
    pub fn new(name: impl Into<String>, config_path: PathBuf, config_dir: PathBuf, log_dir: PathBuf) -> Self {
        GuestInstance {
            name: name.into(),
            config_path,
            config_dir,
            log_dir,
            state: Mutex::new(GuestState::Empty),
            cid: Mutex::new(None),
            plan: Mutex::new(None),
            coproc_specs: Mutex::new(Vec::new()),
            coprocs: Mutex::new(Vec::new()),
            main: Mutex::new(None),
            queue: Mutex::new(EndCallQueue::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }

    pub fn state(&self) -> GuestState {
        *self.state.lock().expect("guest state mutex poisoned")
    }

    pub fn cid(&self) -> Option<u32> {
        *self.cid.lock().expect("guest cid mutex poisoned")
    }

    fn set_state(&self, state: GuestState) {
        *self.state.lock().expect("guest state mutex poisoned") = state;
    }

    /// Build the emulator argument list, allocate a CID, and queue any
    /// host-side mutations the build performed. Transitions Empty → Created.
    pub async fn build(&self, config: &GuestConfig, cid_pool: &CidPool) -> Result<(), GuestError> {
        if self.state() != GuestState::Empty {
            return Err(GuestError::InstanceConflict(self.name.clone()));
        }
        let out = civ_argbuilder::build(config, &self.config_dir, cid_pool).await?;

        *self.cid.lock().expect("guest cid mutex poisoned") = Some(out.cid);
        *self.plan.lock().expect("guest plan mutex poisoned") = Some(EmulatorPlan {
            path: out.emulator_path,
            args: out.emulator_args,
        });
        *self.coproc_specs.lock().expect("guest coproc specs mutex poisoned") = out.coprocs;
        *self.queue.lock().expect("guest queue mutex poisoned") = out.queue;

        self.set_state(GuestState::Created);
        info!(guest = %self.name, cid = out.cid, "guest built");
        Ok(())
    }

    /// Start every co-process in declared order, then the main emulator.
    /// Transitions Created → Booting.
    pub async fn start(&self, env: Vec<String>) -> Result<(), GuestError> {
        if self.state() != GuestState::Created {
            return Err(GuestError::InstanceConflict(self.name.clone()));
        }
        let specs = self.coproc_specs.lock().expect("guest coproc specs mutex poisoned").clone();
        let mut started: Vec<Box<dyn CoProcess>> = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut proc = self.coproc_from_spec(spec, &env);
            proc.run().await?;
            started.push(proc);
        }
        *self.coprocs.lock().expect("guest coprocs mutex poisoned") = started;

        let plan = self.plan.lock().expect("guest plan mutex poisoned").take();
        let plan = plan.ok_or_else(|| GuestError::NotBuilt(self.name.clone()))?;
        let mut main = ProcessSupervisor::new(plan.path, plan.args, self.log_dir.clone());
        main.set_env(env);
        main.run().await?;
        *self.main.lock().expect("guest main mutex poisoned") = Some(main);

        self.set_state(GuestState::Booting);
        info!(guest = %self.name, "guest booting");
        Ok(())
    }

    fn coproc_from_spec(&self, spec: CoProcSpec, env: &[String]) -> Box<dyn CoProcess> {
        match spec {
            CoProcSpec::Generic { program, args } => {
                Box::new(GenericCoProcess::new(program, args, self.log_dir.clone()).with_env(env.to_vec()))
            }
            CoProcSpec::Rpmb { bin_path, data_dir } => {
                Box::new(RpmbCoProcess::new(bin_path, PathBuf::from(data_dir), self.log_dir.clone()))
            }
            CoProcSpec::Vtpm { bin_path, data_dir } => {
                Box::new(VtpmCoProcess::new(bin_path, PathBuf::from(data_dir), self.log_dir.clone()))
            }
        }
    }

    /// Whether the main emulator's monitor still reports it alive.
    pub fn main_running(&self) -> bool {
        self.main
            .lock()
            .expect("guest main mutex poisoned")
            .as_ref()
            .is_some_and(ProcessSupervisor::running)
    }

    /// Booting → Running, on a successful readiness RPC.
    pub fn mark_running(&self) {
        self.set_state(GuestState::Running);
        info!(guest = %self.name, "guest running");
    }

    /// Block until the main emulator's monitor task has observed exit.
    pub async fn join_main(&self) {
        let mut main = self.main.lock().expect("guest main mutex poisoned").take();
        if let Some(main) = main.as_mut() {
            main.join().await;
        }
        *self.main.lock().expect("guest main mutex poisoned") = main;
    }

    /// Terminate the main emulator, then every co-process in declared
    /// order, release the CID, and drain the end-call queue in FIFO
    /// order. Legal in any state; a no-op in Empty.
    pub async fn stop(&self, cid_pool: &CidPool) {
        if self.state() == GuestState::Empty {
            return;
        }

        if let Some(mut main) = self.main.lock().expect("guest main mutex poisoned").take() {
            main.stop().await;
        }

        let mut coprocs = std::mem::take(&mut *self.coprocs.lock().expect("guest coprocs mutex poisoned"));
        for proc in coprocs.iter_mut() {
            proc.stop().await;
        }

        if let Some(cid) = self.cid.lock().expect("guest cid mutex poisoned").take() {
            if let Err(e) = cid_pool.release(cid) {
                warn!(guest = %self.name, cid, error = %e, "failed to release cid");
            }
        }

        self.queue.lock().expect("guest queue mutex poisoned").drain();
        self.coproc_specs.lock().expect("guest coproc specs mutex poisoned").clear();
        self.set_state(GuestState::Empty);
        info!(guest = %self.name, "guest stopped");
    }

    /// Reserved for a future QMP-driven pause. Logged no-op today.
    pub fn pause(&self) {
        warn!(guest = %self.name, "pause requested; not yet implemented, ignoring");
    }
}
