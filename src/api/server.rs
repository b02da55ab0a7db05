use std::{
    convert::Infallible,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
};

use hyper::{Request, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast,
    task::JoinSet,
    time,
};

use crate::{logging::LogContext, store::StateReader, util::AbortOnDropHandle};

use super::{
    error::{ReadSurfaceError, Result},
    handle,
};

/// Configuration for the read surface server.
#[derive(Clone, Debug)]
pub struct ReadSurfaceConfig {
    bind_addr: SocketAddr,
    shutdown_timeout: time::Duration,
}

impl Default for ReadSurfaceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            shutdown_timeout: time::Duration::from_secs(2),
        }
    }
}

impl ReadSurfaceConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }

    /// Sets the address the server listens on. Port `0` picks a free port.
    ///
    /// Default: `127.0.0.1:8080`
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets how long a shutdown waits for the accept loop before aborting it.
    ///
    /// Default: `2` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = time::Duration::from_secs(secs);
        self
    }
}

/// Controller for a running read surface.
#[derive(Debug)]
pub struct ReadSurfaceController {
    local_addr: SocketAddr,
    handle: Mutex<Option<AbortOnDropHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: time::Duration,
}

impl ReadSurfaceController {
    /// Address the server actually listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn try_consume_handle(&self) -> Option<AbortOnDropHandle<()>> {
        self.handle
            .lock()
            .expect("`ReadSurfaceController` mutex can't be poisoned")
            .take()
    }

    /// Stops accepting connections and closes the open ones.
    ///
    /// This method can only be called once per controller instance.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(mut handle) = self.try_consume_handle() else {
            return Err(ReadSurfaceError::AlreadyShutdown);
        };

        let _ = self.shutdown_tx.send(());

        tokio::select! {
            join_res = &mut handle => join_res.map_err(ReadSurfaceError::TaskJoin),
            _ = time::sleep(self.shutdown_timeout) => {
                handle.abort();
                Err(ReadSurfaceError::ShutdownTimeout)
            }
        }
    }
}

/// HTTP/1 server answering read-surface requests with [`handle`].
pub struct ReadSurface;

impl ReadSurface {
    /// Binds the configured address and starts serving, one task per connection.
    pub async fn bind(
        config: ReadSurfaceConfig,
        reader: Arc<dyn StateReader>,
    ) -> Result<Arc<ReadSurfaceController>> {
        let listener = TcpListener::bind(config.bind_addr())
            .await
            .map_err(|source| ReadSurfaceError::Bind {
                addr: config.bind_addr(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(ReadSurfaceError::LocalAddr)?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        log::info!("{} READ_SURFACE_LISTENING addr={}", LogContext::new(), local_addr);

        let handle = tokio::spawn(accept_loop(listener, reader, shutdown_rx)).into();

        Ok(Arc::new(ReadSurfaceController {
            local_addr,
            handle: Mutex::new(Some(handle)),
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout(),
        }))
    }
}

async fn accept_loop(
    listener: TcpListener,
    reader: Arc<dyn StateReader>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let log_ctx = LogContext::new();

    // Dropping the set aborts the connections still open
    let mut connections = JoinSet::new();
    let mut consecutive_failures = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    consecutive_failures = 0;
                    connections.spawn(serve(stream, peer, reader.clone()));
                }
                Err(e) => {
                    let delay = accept_retry_delay(consecutive_failures);
                    consecutive_failures = consecutive_failures.saturating_add(1);

                    log::warn!(
                        "{} ACCEPT_FAILED error={} retry_in={:?}",
                        log_ctx,
                        e,
                        delay
                    );

                    // Errors such as EMFILE persist until connections close
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = shutdown_rx.recv() => break,
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    log::info!(
        "{} READ_SURFACE_STOPPED open_connections={}",
        log_ctx,
        connections.len()
    );
}

const ACCEPT_RETRY_BASE: time::Duration = time::Duration::from_millis(50);
const ACCEPT_RETRY_MAX: time::Duration = time::Duration::from_secs(1);

/// Delay before accepting again after `consecutive_failures` failed accepts, doubling up to
/// [`ACCEPT_RETRY_MAX`].
pub(super) fn accept_retry_delay(consecutive_failures: u32) -> time::Duration {
    ACCEPT_RETRY_BASE
        .saturating_mul(1 << consecutive_failures.min(5))
        .min(ACCEPT_RETRY_MAX)
}

async fn serve(stream: TcpStream, peer: SocketAddr, reader: Arc<dyn StateReader>) {
    let service = service_fn(move |req: Request<Incoming>| {
        let response = handle(reader.as_ref(), req.method(), req.uri().path());

        log::debug!(
            "{} REQUEST_SERVED peer={} method={} path={} status={}",
            LogContext::new(),
            peer,
            req.method(),
            req.uri().path(),
            response.status().as_u16()
        );

        async move { Ok::<_, Infallible>(response) }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        log::debug!(
            "{} CONNECTION_CLOSED peer={} error={}",
            LogContext::new(),
            peer,
            e
        );
    }
}
