//! Request dispatch table, per §4.7's semantics.

use std::sync::Arc;

use tracing::{error, info};

use civ_config::GuestConfig;
use civ_guest::{GuestInstance, GuestState};
use civ_protocol::{GuestSummary, Request, Response, ResponseBody};

use crate::Broker;

/// Outcome of one dispatched request: the reply to send, and whether the
/// broker's accept loop should stop after sending it (only `StopService`).
pub(crate) struct Dispatched {
    pub response: Response,
    pub stop: bool,
}

impl Dispatched {
    fn ok() -> Self {
        Dispatched {
            response: Response::ok(),
            stop: false,
        }
    }
    fn ok_with(body: ResponseBody) -> Self {
        Dispatched {
            response: Response::Success(body),
            stop: false,
        }
    }
    fn fail() -> Self {
        Dispatched {
            response: Response::Failure,
            stop: false,
        }
    }
}

impl Broker {
    pub(crate) async fn dispatch(self: &Arc<Self>, request: Request) -> Dispatched {
        match request {
            Request::Ping => Dispatched::ok(),
            Request::StopService => self.stop_service().await,
            Request::ListGuests => self.list_guests(),
            Request::ImportConfig { path } => self.import_config(path).await,
            Request::StartGuest { name, env } => self.start_guest(name, env).await,
            Request::StopGuest { name } => self.stop_guest(name).await,
            Request::GetState { name } => self.get_state(name),
        }
    }

    async fn stop_service(self: &Arc<Self>) -> Dispatched {
        info!("StopService: tearing down all guests");
        for (name, _) in self.registry.list() {
            if let Some(instance) = self.registry.get(&name) {
                instance.stop(self.cid_pool).await;
            }
            self.registry.unregister(&name);
        }
        Dispatched {
            response: Response::ok(),
            stop: true,
        }
    }

    fn list_guests(&self) -> Dispatched {
        let guests = self
            .registry
            .list()
            .into_iter()
            .map(|(name, state)| GuestSummary { name, state })
            .collect();
        Dispatched::ok_with(ResponseBody::Guests(guests))
    }

    async fn import_config(self: &Arc<Self>, path: String) -> Dispatched {
        let config = match GuestConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                error!(path = %path, error = %e, "ImportConfig: failed to load config");
                return Dispatched::fail();
            }
        };
        let name = config.name().to_string();

        let (instance, freshly_registered) = match self.registry.get(&name) {
            Some(existing) => (existing, false),
            None => {
                let fresh = Arc::new(GuestInstance::new(
                    name.clone(),
                    std::path::PathBuf::from(&path),
                    self.config_dir.clone(),
                    self.log_dir.clone(),
                ));
                if let Err(e) = self.registry.register(Arc::clone(&fresh)) {
                    error!(guest = %name, error = %e, "ImportConfig: registration conflict");
                    return Dispatched::fail();
                }
                (fresh, true)
            }
        };

        match instance.build(&config, self.cid_pool).await {
            Ok(()) => Dispatched::ok(),
            Err(e) => {
                error!(guest = %name, error = %e, "ImportConfig: build failed");
                if freshly_registered {
                    self.registry.unregister(&name);
                }
                Dispatched::fail()
            }
        }
    }

    async fn start_guest(self: &Arc<Self>, name: String, env: Vec<String>) -> Dispatched {
        let Some(instance) = self.registry.get(&name) else {
            error!(guest = %name, "StartGuest: unknown instance");
            return Dispatched::fail();
        };
        if instance.state() != GuestState::Created {
            error!(guest = %name, state = %instance.state(), "StartGuest: not in Created state");
            return Dispatched::fail();
        }
        if let Err(e) = instance.start(env).await {
            error!(guest = %name, error = %e, "StartGuest: failed to start co-processes/emulator");
            return Dispatched::fail();
        }

        match civ_guest::boot(&instance, &self.readiness).await {
            Ok(()) => {
                tokio::spawn(civ_guest::watch_exit(
                    Arc::clone(&instance),
                    self.cid_pool,
                    Arc::clone(&self.registry),
                ));
                Dispatched::ok()
            }
            Err(e) => {
                error!(guest = %name, error = %e, "StartGuest: readiness not reached");
                instance.stop(self.cid_pool).await;
                self.registry.unregister(&name);
                Dispatched::fail()
            }
        }
    }

    async fn stop_guest(self: &Arc<Self>, name: String) -> Dispatched {
        let Some(instance) = self.registry.get(&name) else {
            error!(guest = %name, "StopGuest: unknown instance");
            return Dispatched::fail();
        };
        instance.stop(self.cid_pool).await;
        self.registry.unregister(&name);
        Dispatched::ok()
    }

    fn get_state(&self, name: String) -> Dispatched {
        let Some(instance) = self.registry.get(&name) else {
            error!(guest = %name, "GetState: unknown instance");
            return Dispatched::fail();
        };
        Dispatched::ok_with(ResponseBody::State(instance.state().to_string()))
    }
}
