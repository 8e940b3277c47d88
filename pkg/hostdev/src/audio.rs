//! Works around a known i915/SOF interaction: the SOF audio module must
//! be unloaded before a GVT-d graphics rebind and reloaded on teardown.

use tracing::{info, warn};

use civ_constants::coproc::SOF_AUDIO_MODULE;
use civ_constants::paths::PROC_ASOUND_CARDS;

use crate::endcall::EndCallQueue;
use crate::error::HostDevError;

fn host_uses_sof() -> bool {
    std::fs::read_to_string(PROC_ASOUND_CARDS)
        .map(|contents| contents.to_lowercase().contains("sof"))
        .unwrap_or(false)
}

/// If the host's sound card is SOF-based, unload the SOF module and
/// enqueue a restore action that reloads it.
pub async fn unload_if_needed(queue: &EndCallQueue) -> Result<(), HostDevError> {
    if !host_uses_sof() {
        return Ok(());
    }
    info!(module = SOF_AUDIO_MODULE, "unloading SOF audio module before passthrough");
    let status = tokio::process::Command::new("modprobe")
        .args(["-r", SOF_AUDIO_MODULE])
        .status()
        .await
        .map_err(|_| HostDevError::ModprobeFailed(SOF_AUDIO_MODULE.into()))?;

    if status.success() {
        queue.push(Box::new(|| {
            info!(module = SOF_AUDIO_MODULE, "reloading SOF audio module");
            if let Err(e) = std::process::Command::new("modprobe").arg(SOF_AUDIO_MODULE).status() {
                warn!(module = SOF_AUDIO_MODULE, error = %e, "failed to reload SOF audio module");
            }
        }));
    }
    Ok(())
}
