// src/engine/core.rs

//! Pure core runner state machine.
//!
//! This module contains a synchronous, deterministic "core runner" that
//! consumes [`RuntimeEvent`]s (plus the current instant) and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels and sleeping until quiescence deadlines
//! - spawning and cancelling prefix watchers
//! - calling into the `Supervisor`
//! - delivering notices to the caller
//!
//! The core has no channels, no processes and no network, so it can be
//! unit tested with hand-made instants.

use tokio::time::Instant;

use crate::engine::event_handlers::CoreStep;
use crate::engine::quiescence::QuiescenceTimer;
use crate::engine::{RunnerOptions, RunnerState, RuntimeEvent};
use crate::env::{EnvironmentMap, Merger};

/// Pure core runner state.
#[derive(Debug)]
pub struct CoreRunner {
    pub(super) state: RunnerState,
    pub(super) once: bool,
    pub(super) merger: Merger,
    pub(super) timer: QuiescenceTimer,
    /// Environment of the current child.
    pub(super) applied: Option<EnvironmentMap>,
    /// Generation of the live child, if any.
    pub(super) current_generation: Option<u64>,
    /// Spawn requested but not yet confirmed.
    pub(super) pending_spawn: Option<(u64, EnvironmentMap)>,
    pub(super) next_generation: u64,
    /// Whether a spawn has ever been requested (used by once mode).
    pub(super) spawned_once: bool,
}

impl CoreRunner {
    pub fn new(options: &RunnerOptions) -> Self {
        Self {
            state: RunnerState::Idle,
            once: options.once,
            merger: Merger::new(options.prefixes.len(), options.transform),
            timer: QuiescenceTimer::new(options.wait),
            applied: None,
            current_generation: None,
            pending_spawn: None,
            next_generation: 1,
            spawned_once: false,
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Environment the current child was started with.
    pub fn applied_env(&self) -> Option<&EnvironmentMap> {
        self.applied.as_ref()
    }

    /// Generation of the live child, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.current_generation
    }

    /// When the shell should next deliver `RuntimeEvent::QuiescenceElapsed`.
    pub fn deadline(&self) -> Option<Instant> {
        if self.state.is_terminal() {
            return None;
        }
        self.timer.deadline()
    }

    /// Leave `Idle`: the shell should start the watchers.
    pub fn start(&mut self) -> CoreStep {
        self.handle_start()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent, now: Instant) -> CoreStep {
        match event {
            RuntimeEvent::SnapshotReceived { position, snapshot } => {
                self.handle_snapshot(position, snapshot, now)
            }
            RuntimeEvent::QuiescenceElapsed => self.handle_quiescence(now),
            RuntimeEvent::ChildSpawned { generation, pid } => {
                self.handle_child_spawned(generation, pid)
            }
            RuntimeEvent::SpawnFailed { generation, error } => {
                self.handle_spawn_failed(generation, error)
            }
            RuntimeEvent::ChildExited {
                generation,
                outcome,
            } => self.handle_child_exited(generation, outcome),
            RuntimeEvent::ForwardSignal(signal) => self.handle_forward_signal(signal),
            RuntimeEvent::StopRequested => self.handle_stop(),
        }
    }
}
