//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! Once the [`ShutdownTrigger`] fires the server:
//! 1. Stops calling `listener.accept()` and drops the listener, so new
//!    connections are refused.
//! 2. Asks every open connection to shut down gracefully: in-flight requests
//!    finish, idle keep-alive connections close.
//! 3. Waits up to the grace period for the connection tasks to end, then
//!    aborts whatever is left.
//! 4. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Keep the grace period shorter than `terminationGracePeriodSeconds`.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::lifecycle::Phase;
use crate::service::Service;
use crate::signal::ShutdownTrigger;

const DEFAULT_GRACE: Duration = Duration::from_secs(30);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The HTTP server. Owns the listening socket from [`bind`](Self::bind)
/// until [`serve`](Self::serve) returns.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    grace: Duration,
}

impl Server {
    /// Binds the listening socket. Port `0` picks a free port; read it back
    /// with [`local_addr`](Self::local_addr).
    ///
    /// ```rust,no_run
    /// # async fn demo() -> Result<(), reel::Error> {
    /// let server = reel::Server::bind("0.0.0.0:3000".parse().unwrap()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let addr = listener.local_addr().map_err(|source| Error::Bind { addr, source })?;
        Ok(Self { listener, addr, grace: DEFAULT_GRACE })
    }

    /// How long the drain may take before open connections are aborted.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections and dispatches them through `service` until
    /// `trigger` fires, then drains.
    ///
    /// Returns `Ok(())` after the drain, including one that ran out of time.
    /// Returns [`Error::Serve`] if accepting fails for a non-transient reason.
    pub async fn serve(self, service: Service, trigger: ShutdownTrigger) -> Result<(), Error> {
        let Self { listener, addr, grace } = self;

        // Shared read-only across connection tasks without copying the
        // routing table.
        let service = Arc::new(service);
        let lifecycle = service.lifecycle().clone();

        // `false` until the trigger fires. The accept loop and every
        // connection task hold a receiver.
        let (stop_tx, stop_rx) = watch::channel(false);
        let watcher = tokio::spawn(async move {
            trigger.fired().await;
            let _ = stop_tx.send(true);
        });

        lifecycle.advance(Phase::Serving);
        info!(%addr, "server started");

        // JoinSet tracks every connection task so the drain can wait for them.
        let mut tasks = JoinSet::new();
        let mut stop = stop_rx.clone();

        loop {
            tokio::select! {
                // `biased` checks arms top to bottom, so a fired trigger wins
                // over connections still queued on the listener.
                biased;

                () = stopped(&mut stop) => {
                    info!(in_flight = tasks.len(), "shutdown requested, draining connections");
                    break;
                }

                res = listener.accept() => match res {
                    Ok((stream, peer)) => {
                        tasks.spawn(connection(stream, peer, Arc::clone(&service), stop_rx.clone()));
                    }
                    Err(e) if is_transient(&e) => {
                        warn!("accept error, retrying: {e}");
                        if is_fd_exhaustion(&e) {
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                    Err(e) => {
                        error!("accept failed: {e}");
                        watcher.abort();
                        tasks.abort_all();
                        lifecycle.advance(Phase::Stopped);
                        return Err(Error::Serve(e));
                    }
                },

                // Reap finished tasks so the JoinSet does not grow without
                // bound on long-running servers.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => reaped(res),
            }
        }

        lifecycle.advance(Phase::Draining);
        drop(listener);

        let drained = tokio::time::timeout(grace, async {
            while let Some(res) = tasks.join_next().await {
                reaped(res);
            }
        })
        .await;

        if drained.is_err() {
            let overrun = Error::Drain { outstanding: tasks.len(), grace };
            error!("{overrun}, aborting");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        lifecycle.advance(Phase::Stopped);
        info!("server stopped");
        Ok(())
    }
}

/// Serves one connection until it closes, or until shutdown is requested and
/// its in-flight requests have finished.
async fn connection(
    stream: TcpStream,
    peer: SocketAddr,
    service: Arc<Service>,
    mut stop: watch::Receiver<bool>,
) {
    // `service_fn` is called once per request on the connection.
    let svc = service_fn(move |req| {
        let service = Arc::clone(&service);
        async move { Ok::<_, Infallible>(service.handle(req).await) }
    });

    // `auto::Builder` speaks HTTP/1.1 and HTTP/2, whichever the client picks.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        () = stopped(&mut stop) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = res {
        debug!(%peer, "connection error: {e}");
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which only happens after it fired.
    let _ = rx.wait_for(|stop| *stop).await;
}

fn reaped(res: Result<(), JoinError>) {
    if let Err(e) = res {
        if e.is_panic() {
            error!("connection task panicked: {e}");
        }
    }
}

/// Accept errors that concern one connection, or a momentary resource
/// shortage, rather than the listener itself.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || is_fd_exhaustion(e)
}

// ENFILE / EMFILE
fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(23 | 24))
}
