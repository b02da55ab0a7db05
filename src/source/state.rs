use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::signal::SystemStatus;

/// Receiver for subscribing to a source's [`SystemStatus`] transitions.
pub type SourceStatusReceiver = broadcast::Receiver<SystemStatus>;

/// Local mirror of a source's operational status, shared by its worker task and its controller.
///
/// The same transitions are also published downstream as `RECEIVER_SYS_STATE_CHANGE` envelopes;
/// this copy only serves the controller.
#[derive(Debug)]
pub(crate) struct SourceStatusManager {
    status: Mutex<SystemStatus>,
    update_tx: broadcast::Sender<SystemStatus>,
}

impl SourceStatusManager {
    pub fn new() -> Arc<Self> {
        let (update_tx, _) = broadcast::channel(16);

        Arc::new(Self {
            status: Mutex::new(SystemStatus::PreInit),
            update_tx,
        })
    }

    fn lock_status(&self) -> MutexGuard<'_, SystemStatus> {
        self.status
            .lock()
            .expect("`SourceStatusManager` mutex can't be poisoned")
    }

    pub fn update(&self, new_status: SystemStatus) {
        let mut status_guard = self.lock_status();
        *status_guard = new_status;
        drop(status_guard);

        // Ignore no-receivers errors
        let _ = self.update_tx.send(new_status);
    }

    pub fn status_snapshot(&self) -> SystemStatus {
        *self.lock_status()
    }

    pub fn update_receiver(&self) -> SourceStatusReceiver {
        self.update_tx.subscribe()
    }
}
