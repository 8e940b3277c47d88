//! Wire protocol for the CiV service mailbox.
//!
//! The design notes in the original spec allow swapping the SysV-style
//! shared memory transport for anything that preserves two properties:
//! at most one request is in flight at a time, and the tag set below is
//! exchanged. This implementation uses a Unix domain socket carrying
//! length-prefixed JSON frames — one connection per request/reply pair.

mod framing;
mod kind;

pub use framing::{read_frame, write_frame, FramingError};
pub use kind::ErrorKind;

use serde::{Deserialize, Serialize};

/// A request sent by a client (`civctl`) to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Health check; always succeeds.
    Ping,
    /// Ask the broker to shut down after tearing down all guests.
    StopService,
    /// List all known guest instances and their states.
    ListGuests,
    /// Parse and register a config file as a new guest instance.
    ImportConfig { path: String },
    /// Start a guest, waiting for readiness or failure.
    StartGuest { name: String, env: Vec<String> },
    /// Stop a running or booting guest.
    StopGuest { name: String },
    /// Report the current state of a guest.
    GetState { name: String },
}

/// A guest name/state pair, as returned by `ListGuests`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestSummary {
    pub name: String,
    pub state: String,
}

/// Bulk data accompanying a successful reply. Most requests carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseBody {
    None,
    Guests(Vec<GuestSummary>),
    State(String),
}

/// The broker's reply. Per spec, only a success/fail tag crosses the
/// wire for errors — callers consult the log for diagnostics. The
/// success path may carry bulk data (a guest list, a state string).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Success(ResponseBody),
    Failure,
}

impl Response {
    pub fn ok() -> Self {
        Response::Success(ResponseBody::None)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}
