// src/engine/event_handlers.rs

//! Event handling logic for the core runner.

use nix::sys::signal::Signal;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::engine::core::CoreRunner;
use crate::engine::{RunnerNotice, RunnerState};
use crate::env::EnvironmentMap;
use crate::errors::EnvconsulError;
use crate::exec::ExitOutcome;
use crate::store::KvSnapshot;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug)]
pub enum CoreCommand {
    /// Spawn one watcher per configured prefix.
    StartWatchers,
    /// Cancel every watcher's in-flight read and end its loop.
    StopWatchers,
    /// Start the child with `env`.
    Spawn { env: EnvironmentMap, generation: u64 },
    /// Stop the current child (graceful, then forced), then start a new one.
    Restart { env: EnvironmentMap, generation: u64 },
    /// Relay a signal to whatever child is current.
    Signal(Signal),
    /// Stop the current child, if any.
    StopChild,
    /// Hand a notice to the caller.
    Notify(RunnerNotice),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self::proceed(Vec::new())
    }

    fn finish(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

impl CoreRunner {
    fn is_shutting_down(&self) -> bool {
        self.state.is_terminal() || self.state == RunnerState::Stopping
    }

    /// State to settle in when no spawn or restart is in progress.
    fn settled_state(&self) -> RunnerState {
        match (self.current_generation.is_some(), self.timer.is_pending()) {
            (true, _) => RunnerState::Running,
            (false, true) => RunnerState::Debouncing,
            (false, false) => RunnerState::Watching,
        }
    }

    fn transition(&mut self, next: RunnerState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "runner state change");
            self.state = next;
        }
    }

    pub(super) fn handle_start(&mut self) -> CoreStep {
        if self.state != RunnerState::Idle {
            return CoreStep::idle();
        }
        info!(prefixes = self.merger.prefix_count(), "starting prefix watchers");
        self.transition(RunnerState::Watching);
        CoreStep::proceed(vec![CoreCommand::StartWatchers])
    }

    /// A watcher delivered a new snapshot.
    ///
    /// - The merged map is always recomputed.
    /// - Nothing is scheduled until every prefix has reported at least once.
    /// - In once mode, changes after the single spawn are ignored.
    pub(super) fn handle_snapshot(
        &mut self,
        position: usize,
        snapshot: KvSnapshot,
        now: Instant,
    ) -> CoreStep {
        if self.is_shutting_down() {
            trace!(position, "snapshot ignored while shutting down");
            return CoreStep::idle();
        }

        let env = self.merger.update(position, snapshot);

        if self.once && self.spawned_once {
            trace!(position, "once mode: ignoring change after the child was started");
            return CoreStep::idle();
        }

        if !self.merger.all_received() {
            debug!(position, "waiting for data from all prefixes");
            return CoreStep::idle();
        }

        self.timer.observe(now, env);
        if self.state == RunnerState::Watching {
            self.transition(RunnerState::Debouncing);
        }
        CoreStep::idle()
    }

    /// The quiescence deadline passed: apply the latest environment unless it
    /// is what the current child already runs with.
    pub(super) fn handle_quiescence(&mut self, now: Instant) -> CoreStep {
        if self.is_shutting_down() {
            return CoreStep::idle();
        }

        let Some(event) = self.timer.poll(now) else {
            trace!("quiescence wakeup before deadline; nothing to flush");
            return CoreStep::idle();
        };

        let settled = self.settled_state();
        self.transition(settled);

        if self.once && self.spawned_once {
            return CoreStep::idle();
        }

        if self.applied.as_ref() == Some(&event.env) {
            debug!(
                fingerprint = %event.env.fingerprint(),
                "environment unchanged; not restarting"
            );
            return CoreStep::idle();
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.spawned_once = true;
        self.pending_spawn = Some((generation, event.env.clone()));

        if let Some(previous) = self.current_generation.take() {
            info!(
                previous,
                generation,
                fingerprint = %event.env.fingerprint(),
                "environment changed; restarting child"
            );
            self.transition(RunnerState::Restarting);
            CoreStep::proceed(vec![CoreCommand::Restart {
                env: event.env,
                generation,
            }])
        } else {
            info!(
                generation,
                fingerprint = %event.env.fingerprint(),
                "environment ready; spawning child"
            );
            self.transition(RunnerState::Spawning);
            CoreStep::proceed(vec![CoreCommand::Spawn {
                env: event.env,
                generation,
            }])
        }
    }

    pub(super) fn handle_child_spawned(&mut self, generation: u64, pid: u32) -> CoreStep {
        match self.pending_spawn.take() {
            Some((pending, env)) if pending == generation => {
                debug!(generation, pid, "child is now current");
                self.applied = Some(env);
                self.current_generation = Some(generation);
                if !self.is_shutting_down() {
                    let settled = self.settled_state();
                    self.transition(settled);
                }
            }
            other => {
                warn!(generation, pid, "spawn confirmation for an unexpected generation");
                self.pending_spawn = other;
            }
        }
        CoreStep::idle()
    }

    /// Spawn failures are fatal: report once, stop watching, finish.
    pub(super) fn handle_spawn_failed(&mut self, generation: u64, error: String) -> CoreStep {
        warn!(generation, error = %error, "child could not be started");
        self.pending_spawn = None;
        self.timer.cancel();
        self.transition(RunnerState::Errored);
        CoreStep::finish(vec![
            CoreCommand::StopWatchers,
            CoreCommand::Notify(RunnerNotice::Error(EnvconsulError::SpawnError(error))),
        ])
    }

    /// The child exited on its own.
    ///
    /// - Exits from retired generations are dropped.
    /// - The exit code is always surfaced.
    /// - In once mode, or on a clean exit, the runner is done. Otherwise it
    ///   keeps watching and will start a new child on the next change.
    pub(super) fn handle_child_exited(&mut self, generation: u64, outcome: ExitOutcome) -> CoreStep {
        if self.current_generation != Some(generation) {
            debug!(generation, "exit of a replaced child ignored");
            return CoreStep::idle();
        }

        self.current_generation = None;
        self.applied = None;

        let mut commands = vec![CoreCommand::Notify(RunnerNotice::ChildExit(outcome.code()))];

        if self.once || outcome.success() {
            info!(generation, exit_code = outcome.code(), once = self.once, "child finished; runner done");
            self.timer.cancel();
            self.transition(RunnerState::Done);
            commands.push(CoreCommand::StopWatchers);
            commands.push(CoreCommand::Notify(RunnerNotice::Done));
            return CoreStep::finish(commands);
        }

        let settled = self.settled_state();
        self.transition(settled);
        CoreStep::proceed(commands)
    }

    pub(super) fn handle_forward_signal(&mut self, signal: Signal) -> CoreStep {
        if self.state.is_terminal() {
            return CoreStep::idle();
        }
        CoreStep::proceed(vec![CoreCommand::Signal(signal)])
    }

    /// Shutdown: cancel watchers and the countdown, stop the child, then
    /// report `Done`. Repeated requests are no-ops.
    pub(super) fn handle_stop(&mut self) -> CoreStep {
        if self.is_shutting_down() {
            return CoreStep::finish(Vec::new());
        }

        info!("stop requested");
        self.transition(RunnerState::Stopping);
        self.timer.cancel();
        self.pending_spawn = None;
        self.current_generation = None;

        let commands = vec![
            CoreCommand::StopWatchers,
            CoreCommand::StopChild,
            CoreCommand::Notify(RunnerNotice::Done),
        ];
        self.transition(RunnerState::Done);
        CoreStep::finish(commands)
    }
}
