// src/engine/mod.rs

//! Orchestration engine for envconsul.
//!
//! This module ties together:
//! - the per-prefix watchers (spawned and cancelled here)
//! - the merger and the quiescence timer
//! - the process supervisor
//!
//! and reacts to:
//! - prefix snapshots
//! - quiescence deadlines
//! - child exits
//! - stop / forward-signal requests from the caller
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; [`runner`] wires both up and hands the caller
//! a [`RunnerHandle`] plus the [`RunnerNotice`] stream.

use std::fmt;
use std::time::Duration;

use nix::sys::signal::Signal;

use crate::config::WaitBounds;
use crate::env::KeyTransform;
use crate::errors::EnvconsulError;
use crate::exec::ExitOutcome;
use crate::store::{KvSnapshot, Prefix, WatcherOptions};

pub mod core;
pub mod event_handlers;
pub mod quiescence;
pub mod runner;
pub mod runtime;

pub use self::core::CoreRunner;
pub use event_handlers::{CoreCommand, CoreStep};
pub use quiescence::{QuiescenceTimer, QuiescentEvent};
pub use runner::{Runner, RunnerHandle};
pub use runtime::Runtime;

/// Life-cycle phase of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Created, watchers not yet started.
    Idle,
    /// Watchers active, no child running.
    Watching,
    /// Watchers active, a quiescence countdown in flight, no child running.
    Debouncing,
    /// A spawn has been requested and not yet confirmed.
    Spawning,
    /// Child alive; watching continues in parallel.
    Running,
    /// Replacing the child with one using a newer environment.
    Restarting,
    /// Shutting down.
    Stopping,
    /// Terminal: an unrecoverable error was reported.
    Errored,
    /// Terminal: finished cleanly.
    Done,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::Errored | RunnerState::Done)
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Events flowing into the runtime from watchers, the supervisor and the
/// caller.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A prefix watcher read a new snapshot. `position` is the prefix's
    /// index in the configured order.
    SnapshotReceived { position: usize, snapshot: KvSnapshot },
    /// The quiescence deadline has passed.
    QuiescenceElapsed,
    /// The supervisor started the child for `generation`.
    ChildSpawned { generation: u64, pid: u32 },
    /// The supervisor could not start the child for `generation`.
    SpawnFailed { generation: u64, error: String },
    /// A child exited on its own.
    ChildExited { generation: u64, outcome: ExitOutcome },
    /// Relay a signal to the current child.
    ForwardSignal(Signal),
    /// Graceful shutdown requested.
    StopRequested,
}

/// Events surfaced to the single external consumer of a runner.
#[derive(Debug)]
pub enum RunnerNotice {
    /// The first unrecoverable failure. The runner has stopped.
    Error(EnvconsulError),
    /// The runner reached `Done` cleanly.
    Done,
    /// The supervised command exited with this code.
    ChildExit(i32),
}

/// Immutable settings for one runner instance.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Ordered prefixes; later ones override earlier ones.
    pub prefixes: Vec<Prefix>,
    pub transform: KeyTransform,
    pub wait: WaitBounds,
    pub watcher: WatcherOptions,
    /// Grace period between the stop signal and SIGKILL.
    pub kill_timeout: Duration,
    /// Run the command exactly once, then finish.
    pub once: bool,
}
