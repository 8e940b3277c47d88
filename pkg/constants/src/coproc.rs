//! Co-process and emulator discovery constants.

/// Fallback emulator binary name searched for in `PATH` when
/// `emulator.path` is empty or does not name an existing file.
pub const DEFAULT_EMULATOR_BIN: &str = "qemu-system-x86_64";

/// Required `emulator.type` value for the (only) supported builder.
pub const EMULATOR_TYPE_QEMU: &str = "QEMU";

/// Maximum SR-IOV virtual functions provisioned, to conserve host memory.
pub const MAX_SRIOV_VFS: u32 = 4;

/// Bytes-per-page used by the hugepage helper (2 MiB hugepages).
pub const HUGEPAGE_SIZE_KB: u64 = 2048;

/// Kernel module unloaded/reloaded around GVT-d passthrough when the SOF
/// audio driver is active.
pub const SOF_AUDIO_MODULE: &str = "snd-sof-pci-intel-tgl";
