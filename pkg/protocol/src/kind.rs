//! Shared error classification.
//!
//! Every fallible crate in this workspace converts its local error type
//! into one of these kinds for logging. The broker never puts the kind
//! on the wire — only the caller-visible `Response::Failure` tag — but
//! a stable vocabulary keeps log lines comparable across crates.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigInvalid,
    ConfigIo,
    ResourceExhausted,
    HostOpFailed,
    InstanceConflict,
    InstanceUnknown,
    ReadinessTimeout,
    ChildSpawnFailed,
    ChildExited,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::ConfigIo => "config_io",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::HostOpFailed => "host_op_failed",
            ErrorKind::InstanceConflict => "instance_conflict",
            ErrorKind::InstanceUnknown => "instance_unknown",
            ErrorKind::ReadinessTimeout => "readiness_timeout",
            ErrorKind::ChildSpawnFailed => "child_spawn_failed",
            ErrorKind::ChildExited => "child_exited",
        };
        f.write_str(s)
    }
}
