#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create log file {path}: {source}")]
    LogCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("data directory {0} does not exist")]
    DataDirMissing(String),
}
