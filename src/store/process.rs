use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use crate::{envelope::RoutedUpdate, logging::LogContext, util::AbortOnDropHandle};

use super::{
    error::StoreApplyError,
    state::StateTreeManager,
    tree::Applied,
};

pub(super) struct StateStoreProcess {
    tree: Arc<StateTreeManager>,
    applied: u64,
    rejected: u64,
    log_ctx: LogContext,
}

impl StateStoreProcess {
    pub fn spawn(
        tree: Arc<StateTreeManager>,
        input_rx: mpsc::Receiver<String>,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> AbortOnDropHandle<()> {
        let shutdown_rx = shutdown_tx.subscribe();

        let process = Self {
            tree,
            applied: 0,
            rejected: 0,
            log_ctx: LogContext::new(),
        };

        tokio::spawn(process.run(input_rx, shutdown_rx)).into()
    }

    async fn run(
        mut self,
        mut input_rx: mpsc::Receiver<String>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        log::info!("{} STATE_STORE_STARTED", self.log_ctx);

        loop {
            tokio::select! {
                text = input_rx.recv() => match text {
                    Some(text) => self.handle(&text),
                    None => {
                        log::info!("{} STATE_STORE_INPUT_CLOSED", self.log_ctx);
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    log::info!("{} STATE_STORE_DRAINING", self.log_ctx);
                    while let Ok(text) = input_rx.try_recv() {
                        self.handle(&text);
                    }
                    break;
                }
            }
        }

        log::info!(
            "{} STATE_STORE_STOPPED applied={} rejected={}",
            self.log_ctx,
            self.applied,
            self.rejected
        );
    }

    fn handle(&mut self, text: &str) {
        match self.apply(text) {
            Ok((path, applied)) => {
                self.applied += 1;
                log::debug!(
                    "{} UPDATE_APPLIED path={} mode={:?}",
                    self.log_ctx,
                    path,
                    applied
                );
            }
            Err(e) => {
                self.rejected += 1;
                log::warn!("{} UPDATE_REJECTED error={}", self.log_ctx, e);
            }
        }
    }

    fn apply(&self, text: &str) -> Result<(String, Applied), StoreApplyError> {
        let update = RoutedUpdate::decode_chain(text)?;
        let path = update.path().to_string();

        let applied = self.tree.write().apply(update, Utc::now())?;

        Ok((path, applied))
    }
}
