//! Host-side vsock readiness listener.
//!
//! One unary RPC: a guest connects, sends a `VmReady` request frame, and
//! gets back an explicit status. The CID the kernel reports for that
//! connection is looked up against a pending table; a hit fires a
//! one-shot channel the guest supervisor is waiting on and replies `Ok`,
//! a miss replies `PreconditionFailed`.

mod error;

pub use error::ReadinessError;

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{info, warn};

use civ_constants::vsock::STARTUP_LISTENER_PORT;

/// The (empty) payload of a `VmReady` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmReadyRequest;

/// The reply to a `VmReady` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmReadyStatus {
    Ok,
    PreconditionFailed,
}

/// Tracks guests waiting for their readiness callback to fire.
pub struct ReadinessListener {
    pending: DashMap<u32, oneshot::Sender<()>>,
}

impl ReadinessListener {
    pub fn new() -> Arc<Self> {
        Arc::new(ReadinessListener {
            pending: DashMap::new(),
        })
    }

    /// Register `cid` as awaiting readiness; returns the receiver half the
    /// caller should await (with its own timeout — this type enforces none).
    pub fn register(&self, cid: u32) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(cid, tx);
        rx
    }

    /// Remove a pending registration without firing it, e.g. because the
    /// guest already failed for an unrelated reason.
    pub fn unregister(&self, cid: u32) {
        self.pending.remove(&cid);
    }

    /// Bind the well-known vsock port and serve `VmReady` calls until the
    /// returned future is dropped or cancelled.
    pub async fn serve(self: Arc<Self>) -> Result<(), ReadinessError> {
        self.serve_on(STARTUP_LISTENER_PORT).await
    }

    pub async fn serve_on(self: Arc<Self>, port: u32) -> Result<(), ReadinessError> {
        let addr = tokio_vsock::VsockAddr::new(libc::VMADDR_CID_ANY, port);
        let listener = tokio_vsock::VsockListener::bind(addr).map_err(|source| ReadinessError::Bind { port, source })?;
        info!(port, "readiness listener bound");

        loop {
            let (mut stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "failed to accept readiness connection");
                    continue;
                }
            };
            let cid = peer.cid();
            let _request: VmReadyRequest = match civ_protocol::read_frame(&mut stream).await {
                Ok(req) => req,
                Err(e) => {
                    warn!(cid, error = %e, "failed to read VmReady request");
                    continue;
                }
            };
            let status = self.handle_vm_ready(cid);
            if let Err(e) = civ_protocol::write_frame(&mut stream, &status).await {
                warn!(cid, error = %e, "failed to write VmReady reply");
            }
        }
    }

    fn handle_vm_ready(&self, cid: u32) -> VmReadyStatus {
        match self.pending.remove(&cid) {
            Some((_, tx)) => {
                info!(cid, "VmReady accepted");
                let _ = tx.send(());
                VmReadyStatus::Ok
            }
            None => {
                warn!(cid, "VmReady from unknown cid");
                VmReadyStatus::PreconditionFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn an_unknown_cid_reports_precondition_failed() {
        let listener = ReadinessListener::new();
        assert_eq!(listener.handle_vm_ready(9999), VmReadyStatus::PreconditionFailed);
    }

    #[tokio::test]
    async fn a_registered_cid_fires_its_receiver_exactly_once() {
        let listener = ReadinessListener::new();
        let rx = listener.register(1024);
        assert_eq!(listener.handle_vm_ready(1024), VmReadyStatus::Ok);
        rx.await.expect("sender was not dropped");
        assert!(listener.pending.is_empty());
    }

    #[tokio::test]
    async fn unregister_prevents_a_later_vmready_from_doing_anything() {
        let listener = ReadinessListener::new();
        let _rx = listener.register(1024);
        listener.unregister(1024);
        listener.handle_vm_ready(1024);
        assert!(listener.pending.is_empty());
    }
}
