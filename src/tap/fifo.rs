use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    os::fd::AsFd,
    os::unix::fs::{FileTypeExt, OpenOptionsExt},
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::OFlag,
    poll::{PollFd, PollFlags, poll},
    sys::stat::Mode,
    unistd::mkfifo,
};

use crate::logging::LogContext;

use super::error::{Result, TapError};

/// Longest single wait for a full pipe to accept the rest of a line.
const WRITABLE_POLL_MS: u16 = 50;

/// Outcome of offering one line to the FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOutcome {
    Written,
    /// Nobody has the FIFO open for reading; the line is discarded.
    NoConsumer,
    /// The consumer's pipe is full; the line is discarded whole.
    ConsumerBehind,
}

/// Writing end of a named pipe, (re)opened lazily whenever a consumer is attached.
pub(crate) struct FifoWriter {
    path: PathBuf,
    file: Option<File>,
    log_ctx: LogContext,
}

impl FifoWriter {
    /// Creates the FIFO at `path`, reusing an existing FIFO left at the same location.
    pub fn create(path: &Path, log_ctx: LogContext) -> Result<Self> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_fifo() => {}
            Ok(_) => return Err(TapError::NotAFifo(path.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                mkfifo(path, Mode::from_bits_truncate(0o644)).map_err(|source| {
                    TapError::CreateFifo {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
            }
            Err(source) => {
                return Err(TapError::Inspect {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: None,
            log_ctx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the FIFO for non-blocking writes. Without a reader the open fails with ENXIO, which
    /// is reported as `None`.
    fn open(&self) -> Result<Option<File>> {
        match OpenOptions::new()
            .write(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&self.path)
        {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.raw_os_error() == Some(Errno::ENXIO as i32) => Ok(None),
            Err(e) => Err(TapError::Open(e)),
        }
    }

    /// Writes as much of `line` as the pipe accepts.
    ///
    /// A line the pipe has no room for at all is skipped. A line that was partially written is
    /// completed, waiting for room in steps of at most [`WRITABLE_POLL_MS`], unless `closed`
    /// reports that the tap is shutting down.
    fn offer(file: &mut File, line: &[u8], closed: &dyn Fn() -> bool) -> Result<WriteOutcome> {
        let mut rest = line;

        while !rest.is_empty() {
            match file.write(rest) {
                Ok(written) => rest = &rest[written..],
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if rest.len() == line.len() {
                        return Ok(WriteOutcome::ConsumerBehind);
                    }
                    if closed() {
                        return Err(TapError::Closed);
                    }

                    let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLOUT)];
                    match poll(&mut fds, WRITABLE_POLL_MS) {
                        Ok(_) | Err(Errno::EINTR) => {}
                        Err(e) => return Err(TapError::Poll(e)),
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Err(TapError::BrokenPipe),
                Err(e) => return Err(TapError::Write(e)),
            }
        }

        Ok(WriteOutcome::Written)
    }

    /// Writes `line` to the current consumer, attaching to a new one if needed. Never blocks for
    /// longer than [`WRITABLE_POLL_MS`] once `closed` returns `true`.
    ///
    /// On any error the handle is released, so the next call attaches to whichever consumer
    /// opens the FIFO next.
    pub fn write_line(&mut self, line: &str, closed: impl Fn() -> bool) -> Result<WriteOutcome> {
        if self.file.is_none() {
            self.file = self.open()?;
        }

        let Some(file) = self.file.as_mut() else {
            return Ok(WriteOutcome::NoConsumer);
        };

        let res = Self::offer(file, line.as_bytes(), &closed);
        if res.is_err() {
            self.file = None;
        }

        res
    }
}

impl Drop for FifoWriter {
    fn drop(&mut self) {
        self.file = None;
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!(
                "{} TAP_FIFO_REMOVE_FAILED path={} error={}",
                self.log_ctx,
                self.path.display(),
                e
            );
        }
    }
}
