use std::sync::{Arc, Mutex};

use tokio::{
    sync::{broadcast, mpsc},
    time,
};

use crate::{logging::LogContext, shared::Identifier, util::AbortOnDropHandle};

mod config;
pub(crate) mod error;
mod process;
mod state;
mod tree;

use error::{Result, StoreError};
use process::StateStoreProcess;
use state::StateTreeManager;

pub use config::StoreConfig;
pub use state::StateReader;
pub use tree::{ListenerNode, ProbeNode, SiteNode, SourceNode, StateQuery, StateTree, StateView};

/// Sending end of the state store's inbound channel.
///
/// Carries serialized site-tier envelopes. Every probe monitor holds one clone.
pub type StoreInput = mpsc::Sender<String>;

/// Controller for shutting down a running state store.
#[derive(Debug)]
pub struct StateStoreController {
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: time::Duration,
    tree: Arc<StateTreeManager>,
}

impl StateStoreController {
    pub fn reader(&self) -> Arc<dyn StateReader> {
        self.tree.clone()
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.handle
            .lock()
            .expect("`StateStoreController` mutex can't be poisoned")
            .take()
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .expect("`StateStoreController` mutex can't be poisoned")
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Applies whatever is already buffered in the inbound channel and stops the store.
    ///
    /// The tree stays readable afterwards. This method can only be called once per controller
    /// instance.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(StoreError::AlreadyShutdown);
        };

        if handle.is_finished() {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());

        tokio::select! {
            join_res = &mut handle => join_res.map_err(StoreError::TaskJoin),
            _ = time::sleep(self.shutdown_timeout) => {
                handle.abort();
                Err(StoreError::ShutdownTimeout)
            }
        }
    }
}

/// Owner of the state tree and the single task that applies updates to it.
///
/// Sites and probes must be announced with [`register_probe`](Self::register_probe); updates
/// addressed to anything else are rejected and logged. Inbound messages are applied in the order
/// they are received.
pub struct StateStore {
    config: StoreConfig,
    tree: Arc<StateTreeManager>,
    input_tx: StoreInput,
    input_rx: mpsc::Receiver<String>,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Self {
        let (input_tx, input_rx) = mpsc::channel(config.input_capacity().get());

        Self {
            config,
            tree: StateTreeManager::new(),
            input_tx,
            input_rx,
        }
    }

    /// Announces a probe and its owning site. Returns `false` if the pair was already registered.
    pub fn register_probe(&self, site: &Identifier, probe: &Identifier) -> bool {
        let created = self.tree.write().register_probe(site, probe);

        if created {
            let log_ctx = LogContext::new().with_site(site).with_probe(probe);
            log::info!("{} PROBE_REGISTERED", log_ctx);
        }

        created
    }

    /// Returns a new sender for the inbound channel.
    pub fn input(&self) -> StoreInput {
        self.input_tx.clone()
    }

    pub fn reader(&self) -> Arc<dyn StateReader> {
        self.tree.clone()
    }

    /// Spawns the applier task.
    ///
    /// The store's own sender is released here, so the inbound channel closes, and the store
    /// stops, once every sender handed out by [`input`](Self::input) has been dropped.
    pub fn start(self) -> Arc<StateStoreController> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let handle = StateStoreProcess::spawn(self.tree.clone(), self.input_rx, &shutdown_tx);

        Arc::new(StateStoreController {
            handle: Mutex::new(Some(handle)),
            shutdown_tx,
            shutdown_timeout: self.config.shutdown_timeout(),
            tree: self.tree,
        })
    }
}
