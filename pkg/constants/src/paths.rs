//! Filesystem path constants.

// ─── Per-user config directory ─────────────────────────────────────────────

/// Directory name appended to the invoking user's home directory to form
/// the per-user config directory: `<home>/.intel/.civ/`.
pub const CONFIG_DIR_SUFFIX: &str = ".intel/.civ";

/// Extension used for per-guest config files inside the config directory.
pub const CONFIG_FILE_EXT: &str = "ini";

// ─── Co-process log directory ──────────────────────────────────────────────

/// Default log directory for co-processes and the main emulator, when no
/// override is configured.
pub const DEFAULT_LOG_DIR: &str = "/tmp";

/// Service log file path used when `civ-server` daemonizes.
pub const SERVICE_LOG_FILE: &str = "/tmp/civ_server.log";

// ─── RPMB / vTPM co-process state files ────────────────────────────────────

/// Filename of the RPMB backing store inside a guest's `rpmb.data_dir`.
pub const RPMB_DATA_FILE: &str = "RPMB_DATA";

/// Filename of the RPMB unix socket inside a guest's `rpmb.data_dir`.
pub const RPMB_SOCK_FILE: &str = "rpmb_sock";

/// Filename of the vTPM control socket inside a guest's `vtpm.data_dir`.
pub const VTPM_SOCK_FILE: &str = "swtpm-sock";

// ─── Mailbox ────────────────────────────────────────────────────────────────

/// Default filesystem path for the broker's mailbox Unix domain socket.
pub const DEFAULT_MAILBOX_SOCKET: &str = "/tmp/civ_server.sock";

/// PID/lock file used to detect an already-running server.
pub const SERVER_LOCK_FILE: &str = "/tmp/civ_server.lock";

// ─── Host sysfs paths ───────────────────────────────────────────────────────

/// Root of the PCI device tree in sysfs.
pub const SYS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// Root of the PCI driver tree in sysfs.
pub const SYS_PCI_DRIVERS: &str = "/sys/bus/pci/drivers";

/// File that triggers a driver re-probe for an unbound device.
pub const SYS_PCI_DRIVERS_PROBE: &str = "/sys/bus/pci/drivers_probe";

/// Name of the VFIO pass-through driver directory under `SYS_PCI_DRIVERS`.
pub const VFIO_PCI_DRIVER: &str = "vfio-pci";

/// BDF of the on-die Intel GPU, used by the GVT-d / SR-IOV graphics paths.
pub const INTEL_GPU_BDF: &str = "0000:00:02.0";

/// 2 MiB hugepage free-page count file.
pub const SYS_HUGEPAGES_FREE: &str = "/sys/kernel/mm/hugepages/hugepages-2048kB/free_hugepages";

/// 2 MiB hugepage requested-page count file.
pub const SYS_HUGEPAGES_NR: &str = "/sys/kernel/mm/hugepages/hugepages-2048kB/nr_hugepages";

/// Path to the ALSA sound card list, used to detect the SOF audio driver.
pub const PROC_ASOUND_CARDS: &str = "/proc/asound/cards";
