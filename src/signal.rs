//! Shutdown trigger and OS signal listener.
//!
//! The trigger is a one-shot with exactly one producer ([`ShutdownHandle`])
//! and one consumer ([`ShutdownTrigger`]). It carries no value: firing it, or
//! dropping the handle, is the whole message.
//!
//! # Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! Keep `SHUTDOWN_TIMEOUT_SECS` below that so the drain finishes on our
//! terms.

use tokio::sync::oneshot;
use tracing::info;

use crate::error::Error;

/// Producer side. Fires at most once; consumed by [`fire`](Self::fire).
#[derive(Debug)]
pub struct ShutdownHandle(oneshot::Sender<()>);

impl ShutdownHandle {
    pub fn fire(self) {
        // The receiver may already be gone if the server stopped on its own.
        let _ = self.0.send(());
    }
}

/// Consumer side, handed to [`Server::serve`](crate::Server::serve).
#[derive(Debug)]
pub struct ShutdownTrigger(oneshot::Receiver<()>);

impl ShutdownTrigger {
    /// Resolves once the handle fires or is dropped.
    pub async fn fired(self) {
        let _ = self.0.await;
    }
}

/// Creates a manually fired trigger.
pub fn trigger() -> (ShutdownHandle, ShutdownTrigger) {
    let (tx, rx) = oneshot::channel();
    (ShutdownHandle(tx), ShutdownTrigger(rx))
}

/// Registers SIGTERM and SIGINT handlers and returns a trigger that fires on
/// the first of them.
///
/// Registration happens before this function returns, so a signal that
/// arrives while the server is still binding is not lost. After the first
/// signal the listener task exits; further signals are absorbed by the
/// (still installed) handlers and the drain deadline bounds the exit.
///
/// Must be called from within a Tokio runtime.
#[cfg(unix)]
pub fn listen() -> Result<ShutdownTrigger, Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).map_err(Error::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
    let (handle, trigger) = trigger();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown signal received"),
            _ = sigint.recv()  => info!(signal = "SIGINT", "shutdown signal received"),
        }
        handle.fire();
    });

    Ok(trigger)
}

/// On Windows only Ctrl-C is available.
#[cfg(not(unix))]
pub fn listen() -> Result<ShutdownTrigger, Error> {
    let (handle, trigger) = trigger();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(signal = "ctrl-c", "shutdown signal received"),
            Err(e) => tracing::error!("failed to listen for Ctrl-C: {e}"),
        }
        handle.fire();
    });

    Ok(trigger)
}
