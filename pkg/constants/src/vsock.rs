//! Vsock CID pool and readiness-listener constants.

/// First CID handed out by the allocator.
pub const CID_BASE: u32 = 1024;

/// Number of CIDs in the allocator's range: `[CID_BASE, CID_BASE + CID_CAPACITY)`.
pub const CID_CAPACITY: u32 = 2048;

/// Well-known vsock port the readiness listener accepts `VmReady` calls on.
pub const STARTUP_LISTENER_PORT: u32 = 9900;

/// Maximum time to wait for a guest's readiness RPC before failing the start.
pub const READY_TIMEOUT_SECS: u64 = 200;

/// Maximum time `ProcessSupervisor::stop` waits for a child to exit after SIGTERM.
pub const STOP_TIMEOUT_SECS: u64 = 10;

/// Maximum name length for a guest instance.
pub const MAX_GUEST_NAME_LEN: usize = 63;
