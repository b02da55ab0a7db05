use std::sync::{Arc, Mutex};

use tokio::{sync::broadcast, time};

use crate::{
    shared::{Identified, Identifier, Siblings, error::DuplicateIdentifierError},
    source::SourceOutbound,
    store::StoreInput,
    util::AbortOnDropHandle,
};

pub(crate) mod error;
mod process;

use error::{ProbeError, Result};
use process::ProbeMonitorProcess;

/// Outbound channel of one source, as handed to its probe's monitor.
pub struct SourceLink {
    source: Identifier,
    outbound: SourceOutbound,
}

impl SourceLink {
    pub fn new(source: Identifier, outbound: SourceOutbound) -> Self {
        Self { source, outbound }
    }
}

impl Identified for SourceLink {
    const KIND: &'static str = "radio source";

    fn id(&self) -> &Identifier {
        &self.source
    }
}

/// Controller for shutting down a running probe monitor.
#[derive(Debug)]
pub struct ProbeMonitorController {
    probe: Identifier,
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: time::Duration,
}

impl ProbeMonitorController {
    pub fn probe(&self) -> &Identifier {
        &self.probe
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.handle
            .lock()
            .expect("`ProbeMonitorController` mutex can't be poisoned")
            .take()
    }

    /// Returns `true` once the monitor has ended, either because every source channel closed or
    /// because it was shut down.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .expect("`ProbeMonitorController` mutex can't be poisoned")
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Asks the monitor to forward what is already buffered in its source channels and stop.
    ///
    /// A monitor that already ended on its own, after all of its sources closed, shuts down
    /// successfully. If the monitor does not stop within the shutdown timeout, it is aborted. This
    /// method can only be called once per controller instance.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(ProbeError::AlreadyShutdown(self.probe.clone()));
        };

        if handle.is_finished() {
            return Ok(());
        }

        // A send error means the monitor already dropped its receiver, the join below settles it
        let _ = self.shutdown_tx.send(());

        tokio::select! {
            join_res = &mut handle => {
                join_res.map_err(|source| ProbeError::TaskJoin {
                    id: self.probe.clone(),
                    source,
                })
            }
            _ = time::sleep(self.shutdown_timeout) => {
                handle.abort();
                Err(ProbeError::ShutdownTimeout(self.probe.clone()))
            }
        }
    }
}

/// Fan-in of every source channel of one probe towards the state store.
///
/// Each source-tier envelope is re-wrapped once into the site tier, adding the probe and site
/// identifiers, and pushed to the store input. Malformed envelopes, and envelopes whose origin
/// does not match the channel they arrived on, are dropped and logged.
pub struct ProbeMonitor {
    site: Identifier,
    probe: Identifier,
    links: Siblings<SourceLink>,
    shutdown_timeout: time::Duration,
}

impl ProbeMonitor {
    pub fn new(site: Identifier, probe: Identifier) -> Self {
        Self {
            site,
            probe,
            links: Siblings::new(),
            shutdown_timeout: time::Duration::from_secs(5),
        }
    }

    /// Adds the outbound channel of one of the probe's sources.
    pub fn add_source(
        &mut self,
        link: SourceLink,
    ) -> std::result::Result<(), DuplicateIdentifierError> {
        self.links.append(link)
    }

    /// Sets how long [`ProbeMonitorController::shutdown`] waits before aborting the monitor.
    ///
    /// Default: `5` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = time::Duration::from_secs(secs);
        self
    }

    pub fn probe(&self) -> &Identifier {
        &self.probe
    }

    /// Starts forwarding to `store_tx` and returns the controller of the running monitor.
    pub fn start(self, store_tx: StoreInput) -> Arc<ProbeMonitorController> {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let links = self
            .links
            .into_iter()
            .map(|link| (link.source, link.outbound))
            .collect();

        let handle = ProbeMonitorProcess::spawn(
            self.site,
            self.probe.clone(),
            links,
            store_tx,
            &shutdown_tx,
        );

        Arc::new(ProbeMonitorController {
            probe: self.probe,
            handle: Mutex::new(Some(handle)),
            shutdown_tx,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}
