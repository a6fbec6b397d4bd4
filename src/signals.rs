// src/signals.rs

//! OS signal listening for the control loop.

use nix::sys::signal::Signal;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::errors::{EnvconsulError, Result};

/// Signals the control loop listens for, paired with their tokio kind.
const HANDLED: [(Signal, fn() -> SignalKind); 6] = [
    (Signal::SIGHUP, SignalKind::hangup),
    (Signal::SIGINT, SignalKind::interrupt),
    (Signal::SIGQUIT, SignalKind::quit),
    (Signal::SIGTERM, SignalKind::terminate),
    (Signal::SIGUSR1, SignalKind::user_defined1),
    (Signal::SIGUSR2, SignalKind::user_defined2),
];

/// Signals that end the invocation after being forwarded.
pub fn is_interrupt(signal: Signal) -> bool {
    matches!(signal, Signal::SIGINT | Signal::SIGTERM | Signal::SIGQUIT)
}

/// Install listeners for every handled signal and funnel them into one
/// channel, in arrival order.
///
/// Installing replaces the default disposition, so an interrupt no longer
/// kills envconsul itself; the receiver decides what to do.
pub fn listen() -> Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(16);

    for (sig, kind) in HANDLED {
        let mut stream = signal(kind()).map_err(|e| {
            EnvconsulError::SignalError(format!("installing handler for {sig}: {e}"))
        })?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                trace!(signal = %sig, "received OS signal");
                if tx.send(sig).await.is_err() {
                    break;
                }
            }
            debug!(signal = %sig, "signal listener stopped");
        });
    }

    Ok(rx)
}
