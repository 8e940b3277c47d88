#[derive(Debug, thiserror::Error)]
pub enum HostDevError {
    #[error("iommu group directory for {0} is missing")]
    IommuGroupMissing(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out waiting for {0} to unbind")]
    UnbindTimeout(String),
    #[error("modprobe of {0} failed")]
    ModprobeFailed(String),
    #[error("cannot parse memory size {0:?}")]
    BadMemSize(String),
    #[error("timed out waiting for hugepages to reach {0}")]
    HugepageTimeout(i64),
    #[error("no free SR-IOV virtual function")]
    NoFreeVf,
}
