// src/exec/child.rs

//! A single supervised child instance.

use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::engine::RuntimeEvent;
use crate::exec::supervisor::ExitOutcome;

/// Requests the supervisor can make of a running child task.
#[derive(Debug)]
pub enum ChildControl {
    /// Relay a signal to the child's process group.
    Signal(Signal),
    /// Graceful-then-forced stop; the outcome is sent back on `done`.
    Stop {
        signal: Signal,
        grace: Duration,
        done: oneshot::Sender<ExitOutcome>,
    },
}

/// Deliver `signal` to the process group led by `pid`.
///
/// A group that no longer exists is not an error: the child has already gone.
pub fn signal_group(pid: u32, signal: Signal) -> nix::Result<()> {
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Own `child` until it exits or is stopped.
///
/// - If the process exits on its own, `RuntimeEvent::ChildExited` is sent to
///   the runtime with this instance's `generation`.
/// - If a `Stop` request arrives, the child is terminated and **no**
///   `ChildExited` event is sent for this instance; the outcome goes back to
///   the requester instead.
/// - If the control channel closes (supervisor dropped), the child is killed.
pub async fn supervise_child(
    mut child: Child,
    pid: u32,
    generation: u64,
    mut control_rx: mpsc::UnboundedReceiver<ChildControl>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    loop {
        tokio::select! {
            status_res = child.wait() => {
                let outcome = match status_res {
                    Ok(status) => ExitOutcome::from(status),
                    Err(e) => {
                        error!(pid, generation, error = %e, "waiting for child process failed");
                        ExitOutcome::Code(-1)
                    }
                };

                info!(
                    pid,
                    generation,
                    exit_code = outcome.code(),
                    success = outcome.success(),
                    "child process exited"
                );

                report_exit(pid, generation, outcome, &mut control_rx, &runtime_tx).await;
                return;
            }

            control = control_rx.recv() => match control {
                Some(ChildControl::Signal(signal)) => {
                    debug!(pid, generation, %signal, "forwarding signal to child");
                    if let Err(e) = signal_group(pid, signal) {
                        warn!(pid, generation, %signal, error = %e, "failed to deliver signal");
                    }
                }
                Some(ChildControl::Stop { signal, grace, done }) => {
                    let outcome = terminate(&mut child, pid, generation, signal, grace).await;
                    if done.send(outcome).is_err() {
                        debug!(pid, generation, "stop requester went away before the child was reaped");
                    }
                    return;
                }
                None => {
                    debug!(pid, generation, "supervisor dropped the child handle; killing process");
                    let _ = signal_group(pid, Signal::SIGKILL);
                    let _ = child.wait().await;
                    return;
                }
            }
        }
    }
}

/// Deliver a natural exit to the runtime.
///
/// A stop that arrives while the runtime is not reading claims the exit
/// instead, so the stopped instance still produces no `ChildExited`.
async fn report_exit(
    pid: u32,
    generation: u64,
    outcome: ExitOutcome,
    control_rx: &mut mpsc::UnboundedReceiver<ChildControl>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    loop {
        tokio::select! {
            res = runtime_tx.send(RuntimeEvent::ChildExited { generation, outcome }) => {
                if res.is_err() {
                    debug!(pid, generation, "runtime channel closed; child exit not delivered");
                }
                return;
            }
            control = control_rx.recv() => match control {
                Some(ChildControl::Stop { done, .. }) => {
                    let _ = done.send(outcome);
                    return;
                }
                Some(ChildControl::Signal(signal)) => {
                    debug!(pid, generation, %signal, "child already exited; dropping signal");
                }
                None => {
                    let _ = runtime_tx.send(RuntimeEvent::ChildExited { generation, outcome }).await;
                    return;
                }
            }
        }
    }
}

/// Send `signal`, wait up to `grace`, then SIGKILL the group.
async fn terminate(
    child: &mut Child,
    pid: u32,
    generation: u64,
    signal: Signal,
    grace: Duration,
) -> ExitOutcome {
    info!(pid, generation, %signal, ?grace, "stopping child process");

    if let Err(e) = signal_group(pid, signal) {
        warn!(pid, generation, %signal, error = %e, "failed to deliver stop signal");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            let outcome = ExitOutcome::from(status);
            debug!(pid, generation, exit_code = outcome.code(), "child stopped within grace period");
            return outcome;
        }
        Ok(Err(e)) => {
            warn!(pid, generation, error = %e, "waiting for child during stop failed");
        }
        Err(_) => {
            warn!(pid, generation, ?grace, "child did not stop within grace period; killing");
        }
    }

    if let Err(e) = signal_group(pid, Signal::SIGKILL) {
        warn!(pid, generation, error = %e, "failed to SIGKILL child process group");
    }
    match child.wait().await {
        Ok(status) => ExitOutcome::from(status),
        Err(e) => {
            error!(pid, generation, error = %e, "reaping killed child failed");
            ExitOutcome::Signaled(Signal::SIGKILL as i32)
        }
    }
}
