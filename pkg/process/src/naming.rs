//! Log file naming for co-processes: `<basename>_<timestamp>_<slot>_out.log`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(0);

/// Allocate a small integer unique to one supervisor's lifetime, used in
/// place of a monitor thread id.
pub fn next_slot() -> u64 {
    NEXT_SLOT.fetch_add(1, Ordering::Relaxed)
}

pub fn log_file_path(log_dir: &Path, program: &str, slot: u64) -> PathBuf {
    let basename = Path::new(program)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string());
    let ts = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{basename}_{ts}_{slot}_out.log"))
}
