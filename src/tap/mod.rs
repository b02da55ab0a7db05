//! Live broadcast of the latest spectrum sample over a named pipe.
//!
//! A producer hands values to [`DataTap::update_value`], which only overwrites a single pending
//! slot and wakes the broadcaster thread. The broadcaster writes whatever value is pending when it
//! wakes up, so a slow or absent consumer never holds the producer back and at most one unread
//! value is in flight.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread,
};

use crate::{logging::LogContext, signal::SpectrumSlice};

pub(crate) mod error;
mod fifo;

use error::{Result, TapError};
use fifo::{FifoWriter, WriteOutcome};

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<SpectrumSlice>,
    closed: bool,
}

/// Single pending value shared by one producer and one broadcaster.
#[derive(Debug, Default)]
pub struct TapSlot {
    state: Mutex<SlotState>,
    wake: Condvar,
}

impl TapSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state
            .lock()
            .expect("`TapSlot` mutex can't be poisoned")
    }

    /// Replaces the pending value. Never blocks on the reader.
    pub fn update_value(&self, value: SpectrumSlice) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state.pending = Some(value);
        drop(state);

        self.wake.notify_one();
    }

    /// Takes the pending value, if any, without waiting.
    pub fn try_take(&self) -> Option<SpectrumSlice> {
        self.lock_state().pending.take()
    }

    /// Blocks until a value is pending and takes it. Returns `None` once the slot is closed.
    pub fn wait_value(&self) -> Option<SpectrumSlice> {
        let mut state = self.lock_state();
        loop {
            if state.closed {
                return None;
            }
            if let Some(value) = state.pending.take() {
                return Some(value);
            }
            state = self
                .wake
                .wait(state)
                .expect("`TapSlot` mutex can't be poisoned");
        }
    }

    /// Closes the slot, waking the broadcaster so that it can exit.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        state.pending = None;
        drop(state);

        self.wake.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }
}

/// Handle to a running tap broadcaster.
///
/// Dropping the handle closes the slot; the broadcaster thread then exits and removes its FIFO.
#[derive(Debug)]
pub struct DataTap {
    slot: Arc<TapSlot>,
    path: PathBuf,
}

impl DataTap {
    /// Creates the FIFO at `path` and starts the broadcaster thread.
    pub fn spawn(path: impl Into<PathBuf>, log_ctx: LogContext) -> Result<Self> {
        let path = path.into();
        let writer = FifoWriter::create(&path, log_ctx.clone())?;
        let slot = Arc::new(TapSlot::new());

        let thread_slot = slot.clone();
        let thread_name = path
            .file_name()
            .map(|name| format!("tap:{}", name.to_string_lossy()))
            .unwrap_or_else(|| "tap".to_string());

        thread::Builder::new()
            .name(thread_name)
            .spawn(move || broadcast_loop(&thread_slot, writer, &log_ctx))
            .map_err(TapError::SpawnThread)?;

        Ok(Self { slot, path })
    }

    pub fn update_value(&self, value: SpectrumSlice) {
        self.slot.update_value(value);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataTap {
    fn drop(&mut self) {
        self.slot.close();
    }
}

fn broadcast_loop(slot: &TapSlot, mut writer: FifoWriter, log_ctx: &LogContext) {
    log::info!(
        "{} TAP_STARTED path={}",
        log_ctx,
        writer.path().display()
    );

    let mut consumer_attached = false;

    while let Some(value) = slot.wait_value() {
        match writer.write_line(&value.to_tap_line(), || slot.is_closed()) {
            Ok(WriteOutcome::Written) => {
                if !consumer_attached {
                    log::info!("{} TAP_CONSUMER_ATTACHED", log_ctx);
                    consumer_attached = true;
                }
            }
            Ok(WriteOutcome::NoConsumer) => {
                log::trace!("{} TAP_NO_CONSUMER", log_ctx);
            }
            Ok(WriteOutcome::ConsumerBehind) => {
                log::trace!("{} TAP_CONSUMER_BEHIND", log_ctx);
            }
            Err(TapError::BrokenPipe) => {
                log::warn!("{} TAP_CONSUMER_DISCONNECTED", log_ctx);
                consumer_attached = false;
            }
            Err(e) => {
                log::warn!("{} TAP_WRITE_FAILED error={}", log_ctx, e);
                consumer_attached = false;
            }
        }
    }

    log::info!("{} TAP_STOPPED", log_ctx);
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{File, OpenOptions},
        io::{BufRead, BufReader},
        os::unix::fs::OpenOptionsExt,
        sync::mpsc,
        time::Duration,
    };

    use chrono::Utc;
    use nix::fcntl::OFlag;

    use crate::shared::FrequencyRange;

    use super::*;

    fn slice(level: f32) -> SpectrumSlice {
        wide_slice(level, 4)
    }

    fn wide_slice(level: f32, bins: usize) -> SpectrumSlice {
        SpectrumSlice::new(
            Utc::now(),
            FrequencyRange::new(100_000, 200_000).unwrap(),
            vec![level; bins],
        )
    }

    fn wait_removed(path: &Path) {
        for _ in 0..200 {
            if !path.exists() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("tap FIFO was not removed");
    }

    fn temp_fifo_path() -> PathBuf {
        std::env::temp_dir().join(format!("diatomite-{}.tap", uuid::Uuid::new_v4()))
    }

    /// Reads the FIFO on a dedicated thread, the way an external consumer would, until a line
    /// ending with `suffix` shows up.
    fn spawn_reader(path: PathBuf, suffix: &'static str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let file = File::open(&path).unwrap();
            let mut reader = BufReader::new(file);
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    return;
                }
                if line.ends_with(suffix) {
                    let _ = tx.send(line);
                    return;
                }
            }
        });
        rx
    }

    fn feed_until_read(tap: &DataTap, rx: &mpsc::Receiver<String>, level: f32) -> String {
        for _ in 0..200 {
            tap.update_value(slice(level));
            if let Ok(line) = rx.recv_timeout(Duration::from_millis(20)) {
                return line;
            }
        }
        panic!("no line received from tap");
    }

    #[test]
    fn second_update_overwrites_unread_value() {
        let slot = TapSlot::new();

        slot.update_value(slice(-80.0));
        slot.update_value(slice(-60.0));

        let value = slot.try_take().unwrap();
        assert_eq!(value.bins(), &[-60.0; 4]);
        assert!(slot.try_take().is_none());
    }

    #[test]
    fn close_wakes_waiting_broadcaster() {
        let slot = Arc::new(TapSlot::new());

        let waiter = {
            let slot = slot.clone();
            thread::spawn(move || slot.wait_value())
        };

        thread::sleep(Duration::from_millis(20));
        slot.close();

        assert!(waiter.join().unwrap().is_none());
        assert!(slot.is_closed());

        // Updates after close are ignored
        slot.update_value(slice(-50.0));
        assert!(slot.try_take().is_none());
    }

    #[test]
    fn wait_value_returns_pending_value() {
        let slot = TapSlot::new();
        slot.update_value(slice(-70.0));
        assert_eq!(slot.wait_value().unwrap().bins(), &[-70.0; 4]);
    }

    #[test]
    fn consumer_receives_tap_lines_and_survives_disconnect() {
        let path = temp_fifo_path();
        let tap = DataTap::spawn(&path, LogContext::new()).unwrap();

        let rx = spawn_reader(path.clone(), ";-42.5,-42.5,-42.5,-42.5\n");
        let line = feed_until_read(&tap, &rx, -42.5);
        assert!(line.ends_with(";100000;100000;200000;-42.5,-42.5,-42.5,-42.5\n"));

        // The first consumer is gone; the producer keeps going and a new consumer attaches
        let rx = spawn_reader(path.clone(), ";-17,-17,-17,-17\n");
        let line = feed_until_read(&tap, &rx, -17.0);
        assert!(line.ends_with(";-17,-17,-17,-17\n"));

        drop(tap);

        wait_removed(&path);
    }

    #[test]
    fn stalled_consumer_does_not_hold_up_shutdown() {
        let path = temp_fifo_path();
        let tap = DataTap::spawn(&path, LogContext::new()).unwrap();

        // Attached but never reads, so the pipe fills up and stays full
        let stalled = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&path)
            .unwrap();

        // Lines wider than the atomic pipe write size, so some end up partially written
        for i in 0..300 {
            tap.update_value(wide_slice(-30.0 - i as f32, 2048));
            thread::sleep(Duration::from_millis(1));
        }

        drop(tap);

        wait_removed(&path);
        drop(stalled);
    }

    #[test]
    fn existing_regular_file_is_refused() {
        let path = temp_fifo_path();
        std::fs::write(&path, b"not a fifo").unwrap();

        let err = DataTap::spawn(&path, LogContext::new()).unwrap_err();
        assert!(matches!(err, TapError::NotAFifo(_)));

        std::fs::remove_file(&path).unwrap();
    }
}
