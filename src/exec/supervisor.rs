// src/exec/supervisor.rs

//! Pluggable supervisor abstraction.
//!
//! The runtime talks to a `Supervisor` instead of spawning processes itself.
//! Production code uses [`ProcessSupervisor`](super::ProcessSupervisor);
//! tests can provide an implementation that records calls and simulates
//! exits without touching the OS.

use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::pin::Pin;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::env::EnvironmentMap;
use crate::errors::Result;

/// Boxed future returned by async supervisor operations.
pub type SupervisorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited on its own with this status code.
    Code(i32),
    /// Terminated by this signal number.
    Signaled(i32),
}

impl ExitOutcome {
    /// Exit code as a shell would report it (`128 + signal` for signals).
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Code(code) => *code,
            ExitOutcome::Signaled(sig) => 128 + sig,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Code(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Code(code),
            (None, Some(sig)) => ExitOutcome::Signaled(sig),
            (None, None) => ExitOutcome::Code(-1),
        }
    }
}

/// Trait abstracting ownership of the single supervised child.
///
/// Implementations hold the authoritative "current child" handle. Every
/// operation targets that handle only; once a child has been stopped or
/// replaced, nothing can reach it through the supervisor any more.
///
/// Natural exits are reported asynchronously as
/// `RuntimeEvent::ChildExited { generation, .. }`. A child ended through
/// [`stop`](Supervisor::stop) produces no such event.
pub trait Supervisor: Send {
    /// Start the command with the given environment, tagging it with
    /// `generation`. Returns the child's PID.
    fn spawn(&mut self, env: &EnvironmentMap, generation: u64) -> Result<u32>;

    /// Deliver `signal` to the current child.
    ///
    /// Returns `false` (and does nothing) if there is no live child.
    fn signal(&mut self, signal: Signal) -> Result<bool>;

    /// Stop the current child: termination signal, wait up to `grace`, then
    /// force-kill. Resolves only once the process has been reaped.
    ///
    /// Returns `None` if there was no live child to stop.
    fn stop(&mut self, grace: Duration) -> SupervisorFuture<'_, Option<ExitOutcome>>;

    /// PID of the current child, if one is running.
    fn current_pid(&self) -> Option<u32>;
}
