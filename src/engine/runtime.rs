// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::env::EnvironmentMap;
use crate::errors::EnvconsulError;
use crate::exec::Supervisor;
use crate::store::{spawn_prefix_watcher, StoreClient};

use super::core::CoreRunner;
use super::{CoreCommand, RunnerNotice, RunnerOptions, RuntimeEvent};

/// Drives the core runner in response to `RuntimeEvent`s and quiescence
/// deadlines, and delegates process work to a `Supervisor`.
///
/// This is the IO shell around `CoreRunner`, which holds all the runner
/// semantics. It is the single owner of the supervisor, so restarts and
/// forwarded signals are serialized through the same loop.
pub struct Runtime<S: Supervisor> {
    core: CoreRunner,
    options: RunnerOptions,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    /// Caller commands (forwarded signals). Unbounded so a busy watcher
    /// channel never drops them.
    control_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    /// Cloned into each watcher.
    event_tx: mpsc::Sender<RuntimeEvent>,
    supervisor: S,
    store: Arc<dyn StoreClient>,
    notices: mpsc::UnboundedSender<RunnerNotice>,
    /// Caller-facing stop request.
    shutdown: CancellationToken,
    /// The stop request has already been fed into the core.
    stop_seen: bool,
    /// Ends every watcher loop; a child of `shutdown`.
    watchers_token: CancellationToken,
    watchers: Vec<JoinHandle<()>>,
}

impl<S: Supervisor> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("watchers", &self.watchers.len())
            .finish_non_exhaustive()
    }
}

impl<S: Supervisor> Runtime<S> {
    pub fn new(
        options: RunnerOptions,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        control_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        supervisor: S,
        store: Arc<dyn StoreClient>,
        notices: mpsc::UnboundedSender<RunnerNotice>,
        shutdown: CancellationToken,
    ) -> Self {
        let watchers_token = shutdown.child_token();
        Self {
            core: CoreRunner::new(&options),
            options,
            event_rx,
            control_rx,
            event_tx,
            supervisor,
            store,
            notices,
            shutdown,
            stop_seen: false,
            watchers_token,
            watchers: Vec::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Waits for whichever comes first: a runtime event, the quiescence
    ///   deadline, or a stop request.
    /// - Feeds it into the core and executes the commands it returns.
    /// - Commands that produce follow-up events (spawn results) are fed back
    ///   into the core before the loop waits again.
    pub async fn run(mut self) {
        info!("envconsul runner started");

        let step = self.core.start();
        let mut keep_running = self.execute_step(step.commands).await && step.keep_running;
        let mut control_open = true;

        while keep_running {
            let deadline = self.core.deadline();

            let event = tokio::select! {
                biased;

                // Caller commands, then queued events, so a signal forwarded
                // just before a stop request still reaches the child.
                maybe_command = self.control_rx.recv(), if control_open => match maybe_command {
                    Some(command) => command,
                    None => {
                        debug!("runner handles dropped; control channel closed");
                        control_open = false;
                        continue;
                    }
                },
                maybe_event = self.event_rx.recv() => match maybe_event {
                    Some(event) => event,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = self.shutdown.cancelled(), if !self.stop_seen => {
                    self.stop_seen = true;
                    RuntimeEvent::StopRequested
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    RuntimeEvent::QuiescenceElapsed
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event, Instant::now());
            let commands_ok = self.execute_step(step.commands).await;
            keep_running = step.keep_running && commands_ok;
        }

        self.shutdown_watchers().await;

        if self.supervisor.current_pid().is_some() {
            warn!("runner exiting with a live child; stopping it");
            if let Err(e) = self.supervisor.stop(self.options.kill_timeout).await {
                warn!(error = %e, "failed to stop child during runner exit");
            }
        }

        info!(state = %self.core.state(), "envconsul runner exiting");
    }

    /// Execute commands, feeding any follow-up events straight back into the
    /// core. Returns `false` if a follow-up step asked to stop.
    async fn execute_step(&mut self, commands: Vec<CoreCommand>) -> bool {
        let mut queue: VecDeque<CoreCommand> = commands.into();
        let mut keep_running = true;

        while let Some(command) = queue.pop_front() {
            if let Some(event) = self.execute_command(command).await {
                debug!(?event, "runtime follow-up event");
                let step = self.core.step(event, Instant::now());
                keep_running &= step.keep_running;
                queue.extend(step.commands);
            }
        }

        keep_running
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Option<RuntimeEvent> {
        match command {
            CoreCommand::StartWatchers => {
                self.start_watchers();
                None
            }
            CoreCommand::StopWatchers => {
                self.shutdown_watchers().await;
                None
            }
            CoreCommand::Spawn { env, generation } => Some(self.spawn_child(&env, generation)),
            CoreCommand::Restart { env, generation } => {
                // A stop requested while the old child is stopping skips the
                // new spawn.
                self.stop_child().await;
                Some(self.spawn_child(&env, generation))
            }
            CoreCommand::Signal(signal) => {
                match self.supervisor.signal(signal) {
                    Ok(true) => debug!(%signal, "signal forwarded to child"),
                    Ok(false) => debug!(%signal, "no current child; signal dropped"),
                    Err(e) => warn!(%signal, error = %e, "failed to forward signal"),
                }
                None
            }
            CoreCommand::StopChild => {
                self.stop_child().await;
                None
            }
            CoreCommand::Notify(notice) => {
                if self.notices.send(notice).is_err() {
                    debug!("notice receiver dropped");
                }
                None
            }
        }
    }

    fn start_watchers(&mut self) {
        for (position, prefix) in self.options.prefixes.iter().enumerate() {
            let handle = spawn_prefix_watcher(
                position,
                prefix.clone(),
                Arc::clone(&self.store),
                self.options.watcher,
                self.event_tx.clone(),
                self.watchers_token.clone(),
            );
            self.watchers.push(handle);
        }
    }

    /// Start the child for `generation`, unless a stop has been requested, in
    /// which case the stop is fed into the core instead.
    fn spawn_child(&mut self, env: &EnvironmentMap, generation: u64) -> RuntimeEvent {
        if self.shutdown.is_cancelled() && !self.stop_seen {
            info!(generation, "stop requested; child not started");
            self.stop_seen = true;
            return RuntimeEvent::StopRequested;
        }

        match self.supervisor.spawn(env, generation) {
            Ok(pid) => RuntimeEvent::ChildSpawned { generation, pid },
            Err(EnvconsulError::SpawnError(error)) => RuntimeEvent::SpawnFailed { generation, error },
            Err(e) => RuntimeEvent::SpawnFailed {
                generation,
                error: e.to_string(),
            },
        }
    }

    /// Stop the current child and wait until it has been reaped.
    async fn stop_child(&mut self) {
        match self.supervisor.stop(self.options.kill_timeout).await {
            Ok(Some(outcome)) => {
                info!(exit_code = outcome.code(), "child stopped");
            }
            Ok(None) => debug!("no live child to stop"),
            Err(e) => warn!(error = %e, "failed to stop child"),
        }
    }

    /// Cancel every watcher and wait for its loop to end.
    async fn shutdown_watchers(&mut self) {
        if !self.watchers.is_empty() {
            debug!(watchers = self.watchers.len(), "cancelling prefix watchers");
        }
        self.watchers_token.cancel();
        for handle in self.watchers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "prefix watcher task failed");
            }
        }
    }
}
