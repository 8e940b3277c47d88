#[derive(Debug, thiserror::Error)]
pub enum ArgBuilderError {
    #[error("no usable emulator binary found (checked emulator.path and PATH)")]
    EmulatorNotFound,
    #[error("{0}")]
    Cid(#[from] civ_cid::CidError),
    #[error("{0}")]
    HostDev(#[from] civ_hostdev::HostDevError),
    #[error("invalid vgpu_uuid {0:?}: must be a 36-character canonical UUID")]
    InvalidVgpuUuid(String),
    #[error("malformed global.vsock_cid {0:?}")]
    InvalidVsockCid(String),
    #[error("unsupported graphics.type {0:?}")]
    UnsupportedGraphicsType(String),
    #[error("unsupported firmware.type {0:?}")]
    UnsupportedFirmwareType(String),
    #[error("failed to flush AAF settings to {path}: {source}")]
    AafFlush {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
