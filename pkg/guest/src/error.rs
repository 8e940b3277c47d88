#[derive(Debug, thiserror::Error)]
pub enum GuestError {
    #[error("guest {0:?} already exists")]
    InstanceConflict(String),
    #[error("no guest named {0:?}")]
    InstanceUnknown(String),
    #[error("{0}")]
    Config(#[from] civ_config::ConfigError),
    #[error("{0}")]
    ArgBuilder(#[from] civ_argbuilder::ArgBuilderError),
    #[error("readiness RPC did not arrive within the boot timeout")]
    ReadinessTimeout,
    #[error("main process exited before the guest became ready")]
    ChildExitedBeforeReady,
    #[error("{0}")]
    ChildSpawn(#[from] civ_process::ProcessError),
    #[error("guest {0:?} has no built emulator command line to start")]
    NotBuilt(String),
}
