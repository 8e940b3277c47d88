//! The per-guest supervisor logic of §4.6: wait for readiness, then for
//! exit, then tear down and deregister.
//!
//! Split into two phases so a caller can block on the first (readiness)
//! and detach the second (exit-then-stop) as a background task — this is
//! what lets `StartGuest` return as soon as the guest is ready while the
//! guest keeps running under supervision afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{info, warn};

use civ_cid::CidPool;
use civ_constants::vsock::READY_TIMEOUT_SECS;
use civ_readiness::ReadinessListener;

use crate::error::GuestError;
use crate::instance::GuestInstance;
use crate::registry::GuestRegistry;

/// Waits on the ready-latch with a per-second polling loop, up to
/// `READY_TIMEOUT_SECS` iterations, aborting early if the main process
/// has already died.
pub async fn wait_vm_ready(instance: &GuestInstance, mut ready_rx: oneshot::Receiver<()>) -> Result<(), GuestError> {
    for _ in 0..READY_TIMEOUT_SECS {
        match ready_rx.try_recv() {
            Ok(()) => return Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => return Err(GuestError::ChildExitedBeforeReady),
            Err(oneshot::error::TryRecvError::Empty) => {}
        }
        if !instance.main_running() {
            return Err(GuestError::ChildExitedBeforeReady);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Err(GuestError::ReadinessTimeout)
}

/// Steps 1-2 of §4.6: register for readiness and wait for it. On success
/// the instance transitions Booting → Running; on failure the pending
/// registration is removed and the caller is responsible for `StopVm`.
pub async fn boot(instance: &GuestInstance, readiness: &ReadinessListener) -> Result<(), GuestError> {
    let cid = instance.cid().ok_or_else(|| GuestError::NotBuilt(instance.name().to_string()))?;
    let ready_rx = readiness.register(cid);
    match wait_vm_ready(instance, ready_rx).await {
        Ok(()) => {
            instance.mark_running();
            Ok(())
        }
        Err(e) => {
            readiness.unregister(cid);
            warn!(guest = %instance.name(), error = %e, "guest failed to reach readiness");
            Err(e)
        }
    }
}

/// Steps 3-4 of §4.6: block until the main process exits, then stop and
/// deregister unconditionally. Meant to run detached, after `boot` has
/// already reported success.
pub async fn watch_exit(instance: Arc<GuestInstance>, cid_pool: &'static CidPool, registry: Arc<GuestRegistry>) {
    let name = instance.name().to_string();
    instance.join_main().await;
    info!(guest = %name, "main process exited");
    instance.stop(cid_pool).await;
    registry.unregister(&name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn new_instance() -> GuestInstance {
        GuestInstance::new(
            "demo",
            PathBuf::from("/tmp/demo.ini"),
            PathBuf::from("/tmp"),
            PathBuf::from("/tmp"),
        )
    }

    #[tokio::test]
    async fn wait_vm_ready_succeeds_as_soon_as_the_receiver_fires() {
        let instance = new_instance();
        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();
        assert!(wait_vm_ready(&instance, rx).await.is_ok());
    }

    #[tokio::test]
    async fn wait_vm_ready_aborts_when_the_sender_is_dropped() {
        let instance = new_instance();
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let err = wait_vm_ready(&instance, rx).await.unwrap_err();
        assert!(matches!(err, GuestError::ChildExitedBeforeReady));
    }

    #[tokio::test]
    async fn wait_vm_ready_aborts_when_the_main_process_is_not_running() {
        let instance = new_instance();
        let (_tx, rx) = oneshot::channel();
        let err = wait_vm_ready(&instance, rx).await.unwrap_err();
        assert!(matches!(err, GuestError::ChildExitedBeforeReady));
    }

    #[tokio::test]
    async fn boot_fails_fast_when_the_instance_was_never_built() {
        let instance = new_instance();
        let readiness = ReadinessListener::new();
        let err = boot(&instance, &readiness).await.unwrap_err();
        assert!(matches!(err, GuestError::NotBuilt(_)));
    }
}
