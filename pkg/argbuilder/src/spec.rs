//! The data the builder hands back to the guest supervisor: nothing here
//! spawns a process, it only describes what should be spawned.

use civ_hostdev::EndCallQueue;

/// A co-process to start alongside the main emulator, in order.
#[derive(Debug, Clone)]
pub enum CoProcSpec {
    Rpmb { bin_path: String, data_dir: String },
    Vtpm { bin_path: String, data_dir: String },
    Generic { program: String, args: Vec<String> },
}

/// Everything produced by a successful build.
pub struct BuildOutput {
    pub emulator_path: String,
    pub emulator_args: Vec<String>,
    pub coprocs: Vec<CoProcSpec>,
    pub cid: u32,
    pub queue: EndCallQueue,
}
