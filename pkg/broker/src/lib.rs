//! The service broker: accepts client requests over the mailbox Unix
//! socket and dispatches them, per §4.7. The mailbox holds at most one
//! request in flight — each connection is read, dispatched, and replied
//! to before the next connection is accepted.

mod dispatch;
mod error;

pub use error::BrokerError;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use civ_cid::CidPool;
use civ_guest::GuestRegistry;
use civ_protocol::Request;
use civ_readiness::ReadinessListener;

pub struct Broker {
    registry: Arc<GuestRegistry>,
    readiness: Arc<ReadinessListener>,
    cid_pool: &'static CidPool,
    config_dir: PathBuf,
    log_dir: PathBuf,
    socket_path: PathBuf,
}

impl Broker {
    pub fn new(config_dir: PathBuf, log_dir: PathBuf, socket_path: PathBuf) -> Arc<Self> {
        Arc::new(Broker {
            registry: Arc::new(GuestRegistry::new()),
            readiness: ReadinessListener::new(),
            cid_pool: civ_cid::global(),
            config_dir,
            log_dir,
            socket_path,
        })
    }

    /// The readiness listener this broker's guests register with. The
    /// caller is expected to run its `serve()` future alongside this one.
    pub fn readiness(&self) -> Arc<ReadinessListener> {
        Arc::clone(&self.readiness)
    }

    /// Accept and serve mailbox connections until a `StopService` request
    /// or a termination signal is received. Removes the socket file on
    /// the way out.
    pub async fn serve(self: Arc<Self>) -> Result<(), BrokerError> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|source| BrokerError::StaleSocket {
                path: self.socket_path.display().to_string(),
                source,
            })?;
        }
        let listener = UnixListener::bind(&self.socket_path).map_err(|source| BrokerError::Bind {
            path: self.socket_path.display().to_string(),
            source,
        })?;
        info!(path = %self.socket_path.display(), "mailbox bound");

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            if self.handle_connection(stream).await {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to accept mailbox connection"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT; shutting down");
                    self.dispatch(Request::StopService).await;
                    break;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM; shutting down");
                    self.dispatch(Request::StopService).await;
                    break;
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    /// Reads one request, dispatches it, writes the reply. Returns
    /// whether the accept loop should stop (true only for `StopService`).
    async fn handle_connection(self: &Arc<Self>, mut stream: UnixStream) -> bool {
        let request: Request = match civ_protocol::read_frame(&mut stream).await {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "failed to read mailbox request");
                return false;
            }
        };
        let dispatched = self.dispatch(request).await;
        if let Err(e) = civ_protocol::write_frame(&mut stream, &dispatched.response).await {
            warn!(error = %e, "failed to write mailbox reply");
        }
        dispatched.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_protocol::{Response, ResponseBody};

    fn new_broker() -> Arc<Broker> {
        let dir = std::env::temp_dir();
        Broker::new(dir.clone(), dir.clone(), dir.join("civ-broker-test.sock"))
    }

    #[tokio::test]
    async fn ping_always_succeeds() {
        let broker = new_broker();
        let dispatched = broker.dispatch(Request::Ping).await;
        assert!(dispatched.response.is_success());
        assert!(!dispatched.stop);
    }

    #[tokio::test]
    async fn list_guests_on_an_empty_registry_is_empty() {
        let broker = new_broker();
        let dispatched = broker.dispatch(Request::ListGuests).await;
        match dispatched.response {
            Response::Success(ResponseBody::Guests(guests)) => assert!(guests.is_empty()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_state_on_an_unknown_guest_fails() {
        let broker = new_broker();
        let dispatched = broker.dispatch(Request::GetState { name: "nope".to_string() }).await;
        assert!(!dispatched.response.is_success());
    }

    #[tokio::test]
    async fn stop_guest_on_an_unknown_guest_fails() {
        let broker = new_broker();
        let dispatched = broker.dispatch(Request::StopGuest { name: "nope".to_string() }).await;
        assert!(!dispatched.response.is_success());
    }

    #[tokio::test]
    async fn start_guest_on_an_unknown_guest_fails() {
        let broker = new_broker();
        let dispatched = broker
            .dispatch(Request::StartGuest { name: "nope".to_string(), env: vec![] })
            .await;
        assert!(!dispatched.response.is_success());
    }

    #[tokio::test]
    async fn import_config_on_a_missing_path_fails() {
        let broker = new_broker();
        let dispatched = broker
            .dispatch(Request::ImportConfig { path: "/nonexistent/path.ini".to_string() })
            .await;
        assert!(!dispatched.response.is_success());
    }

    #[tokio::test]
    async fn stop_service_reports_success_and_requests_a_stop() {
        let broker = new_broker();
        let dispatched = broker.dispatch(Request::StopService).await;
        assert!(dispatched.response.is_success());
        assert!(dispatched.stop);
    }

    struct TempIni {
        path: std::path::PathBuf,
    }
    impl TempIni {
        fn new(contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "civ-broker-test-{}-{}.ini",
                std::process::id(),
                contents.len()
            ));
            std::fs::write(&path, contents).unwrap();
            TempIni { path }
        }
    }
    impl Drop for TempIni {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    /// A config that loads fine (passes schema validation) but whose
    /// emulator build fails deterministically (a malformed vgpu uuid),
    /// exercising the no-instance-left-behind guarantee.
    #[tokio::test]
    async fn import_config_unregisters_a_freshly_created_instance_when_build_fails() {
        let broker = new_broker();
        let f = TempIni::new(
            "[global]\nname = leak-test\n[emulator]\ntype = QEMU\npath = /bin/true\n[graphics]\ntype = GVT-g\nvgpu_uuid = not-a-uuid\n",
        );
        let dispatched = broker
            .dispatch(Request::ImportConfig { path: f.path.display().to_string() })
            .await;
        assert!(!dispatched.response.is_success());

        let state = broker.dispatch(Request::GetState { name: "leak-test".to_string() }).await;
        assert!(!state.response.is_success(), "a guest that failed to build must not remain registered");
    }
}
