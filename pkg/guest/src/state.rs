//! Guest lifecycle states.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestState {
    /// No processes are running; nothing is allocated.
    Empty,
    /// Arguments built, CID acquired, nothing started yet.
    Created,
    /// Co-processes and the main emulator are starting; awaiting readiness.
    Booting,
    /// The guest reported ready via the readiness RPC.
    Running,
    /// Reserved for a future QMP-driven pause (never reached today).
    Paused,
}

impl std::fmt::Display for GuestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GuestState::Empty => "empty",
            GuestState::Created => "created",
            GuestState::Booting => "booting",
            GuestState::Running => "running",
            GuestState::Paused => "paused",
        };
        f.write_str(s)
    }
}
