use std::sync::{Arc, Mutex};

use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    time,
};

use crate::{
    frontend::{RadioFrontend, WrappedFrontend},
    logging::LogContext,
    shared::{Identified, Identifier},
    signal::SystemStatus,
    util::AbortOnDropHandle,
};

use super::{
    config::{SourceConfig, SourceControllerConfig},
    error::{Result, SourceError},
    process::{SourceControl, SourceProcess},
    state::{SourceStatusManager, SourceStatusReceiver},
};

/// Receiving end of a source's outbound channel.
///
/// Yields serialized source-tier envelopes in the order the source produced them, and closes once
/// the source has terminated.
pub type SourceOutbound = mpsc::Receiver<String>;

/// Controller for stopping and monitoring a running radio source.
#[derive(Debug)]
pub struct SourceController {
    id: Identifier,
    config: SourceControllerConfig,
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    control_tx: mpsc::Sender<SourceControl>,
    status_manager: Arc<SourceStatusManager>,
}

impl SourceController {
    fn new(
        config: &SourceConfig,
        handle: AbortOnDropHandle<()>,
        control_tx: mpsc::Sender<SourceControl>,
        status_manager: Arc<SourceStatusManager>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: config.id().clone(),
            config: config.into(),
            handle: Mutex::new(Some(handle)),
            control_tx,
            status_manager,
        })
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Returns the current operational status of the source as a snapshot.
    pub fn status_snapshot(&self) -> SystemStatus {
        self.status_manager.status_snapshot()
    }

    /// Creates a new [`SourceStatusReceiver`] for subscribing to status transitions.
    pub fn update_receiver(&self) -> SourceStatusReceiver {
        self.status_manager.update_receiver()
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.handle
            .lock()
            .expect("`SourceController` mutex can't be poisoned")
            .take()
    }

    /// Sends the stop instruction and waits for the source to tear down its listeners and
    /// frontend.
    ///
    /// If the source does not exit within the configured stop timeout, it is aborted. This method
    /// can only be called once per controller instance.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(SourceError::AlreadyStopped(self.id.clone()));
        };

        if handle.is_finished() || self.status_snapshot().is_stopped() {
            return Err(SourceError::AlreadyTerminated {
                id: self.id.clone(),
                status: self.status_snapshot(),
            });
        }

        let stop_res = match self.control_tx.send(SourceControl::Stop).await {
            Ok(()) => {
                tokio::select! {
                    join_res = &mut handle => {
                        join_res.map_err(|source| SourceError::TaskJoin {
                            id: self.id.clone(),
                            source,
                        })
                    }
                    _ = time::sleep(self.config.stop_timeout()) => {
                        handle.abort();
                        Err(SourceError::StopTimeout(self.id.clone()))
                    }
                }
            }
            Err(_) => {
                handle.abort();
                Err(SourceError::SendStopFailed(self.id.clone()))
            }
        };

        if stop_res.is_err() {
            self.status_manager.update(SystemStatus::Failed);
        }

        stop_res
    }

    /// Waits until the source has stopped, gracefully or not, and returns the final status.
    pub async fn until_stopped(&self) -> SystemStatus {
        let mut status_rx = self.update_receiver();

        let status = self.status_snapshot();
        if status.is_stopped() {
            return status;
        }

        loop {
            match status_rx.recv().await {
                Ok(status) if status.is_stopped() => return status,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }
}

/// Builder for one radio source: its frontend, its listeners and their classifiers.
///
/// Nothing runs until [`start`](Self::start) is called. The started source is an isolated task
/// that communicates exclusively through its control channel (held by the returned
/// [`SourceController`]) and its outbound channel (returned as [`SourceOutbound`]).
pub struct SourceAggregator {
    probe: Identifier,
    config: SourceConfig,
    frontend: WrappedFrontend,
    status_manager: Arc<SourceStatusManager>,
    log_ctx: LogContext,
}

impl SourceAggregator {
    pub fn new(probe: Identifier, config: SourceConfig, frontend: Arc<dyn RadioFrontend>) -> Self {
        let log_ctx = LogContext::new()
            .with_probe(&probe)
            .with_source(config.id());

        Self {
            probe,
            config,
            frontend: WrappedFrontend::new(frontend),
            status_manager: SourceStatusManager::new(),
            log_ctx,
        }
    }

    /// Replaces the log context, e.g. to add the owning site.
    pub fn with_log_context(mut self, log_ctx: LogContext) -> Self {
        self.log_ctx = log_ctx;
        self
    }

    pub fn id(&self) -> &Identifier {
        self.config.id()
    }

    pub fn status_snapshot(&self) -> SystemStatus {
        self.status_manager.status_snapshot()
    }

    /// Spawns the source task and returns its controller along with its outbound channel.
    pub fn start(self) -> (Arc<SourceController>, SourceOutbound) {
        let (control_tx, control_rx) = mpsc::channel::<SourceControl>(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity().get());

        let handle = SourceProcess::spawn(
            &self.config,
            self.probe,
            self.frontend,
            control_rx,
            outbound_tx,
            self.status_manager.clone(),
            self.log_ctx,
        );

        let controller =
            SourceController::new(&self.config, handle, control_tx, self.status_manager);

        (controller, outbound_rx)
    }
}
