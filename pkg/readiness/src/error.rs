#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error("failed to bind vsock port {port}: {source}")]
    Bind {
        port: u32,
        #[source]
        source: std::io::Error,
    },
}
