use std::num::NonZeroUsize;

use tokio::time;

/// Configuration for the state store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    input_capacity: NonZeroUsize,
    shutdown_timeout: time::Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            input_capacity: NonZeroUsize::new(4096).expect("not zero"),
            shutdown_timeout: time::Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Returns the capacity of the inbound channel shared by every probe monitor.
    pub fn input_capacity(&self) -> NonZeroUsize {
        self.input_capacity
    }

    /// Returns how long a shutdown waits for the store to apply buffered updates.
    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }

    /// Sets the capacity of the inbound channel. Probe monitors wait while it is full.
    ///
    /// Default: `4096`
    pub fn with_input_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Sets how long a shutdown waits before aborting the store.
    ///
    /// Default: `5` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = time::Duration::from_secs(secs);
        self
    }
}
