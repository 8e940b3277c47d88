#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to bind mailbox socket {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove stale mailbox socket {path}: {source}")]
    StaleSocket {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
