// src/exec/process.rs

use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::env::EnvironmentMap;
use crate::errors::{EnvconsulError, Result};
use crate::exec::child::{supervise_child, ChildControl};
use crate::exec::supervisor::{ExitOutcome, Supervisor, SupervisorFuture};

/// What to run and how to stop it.
#[derive(Debug, Clone)]
pub struct ProcessSupervisorConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Start the child with only the merged environment instead of
    /// inheriting the parent's.
    pub pristine: bool,
    /// Signal sent first when stopping the child.
    pub kill_signal: Signal,
}

/// Handle for the one live child.
struct CurrentChild {
    pid: u32,
    generation: u64,
    control: mpsc::UnboundedSender<ChildControl>,
    task: JoinHandle<()>,
}

/// Production supervisor backed by real OS processes.
///
/// The child is placed in its own process group so that stop and forwarded
/// signals reach everything it spawned.
pub struct ProcessSupervisor {
    config: ProcessSupervisorConfig,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    current: Option<CurrentChild>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config", &self.config)
            .field("current_pid", &self.current_pid())
            .finish()
    }
}

impl ProcessSupervisor {
    pub fn new(config: ProcessSupervisorConfig, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            config,
            runtime_tx,
            current: None,
        }
    }

    fn build_command(&self, env: &EnvironmentMap) -> Result<Command> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| EnvconsulError::SpawnError("no command to run".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);

        if self.config.pristine {
            cmd.env_clear();
        }
        cmd.envs(env.iter());

        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0)
            .kill_on_drop(true);

        Ok(cmd)
    }
}

impl Supervisor for ProcessSupervisor {
    fn spawn(&mut self, env: &EnvironmentMap, generation: u64) -> Result<u32> {
        if let Some(previous) = self.current.take() {
            if !previous.task.is_finished() {
                warn!(
                    pid = previous.pid,
                    generation = previous.generation,
                    "spawning over a live child; previous child will be killed"
                );
            }
        }

        let mut cmd = self.build_command(env)?;
        let child = cmd.spawn().map_err(|e| {
            EnvconsulError::SpawnError(format!("spawning {:?}: {e}", self.config.command))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| EnvconsulError::SpawnError("failed to get process ID".to_string()))?;

        info!(
            pid,
            generation,
            command = ?self.config.command,
            vars = env.len(),
            fingerprint = %env.fingerprint(),
            "spawned child process"
        );

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(supervise_child(
            child,
            pid,
            generation,
            control_rx,
            self.runtime_tx.clone(),
        ));

        self.current = Some(CurrentChild {
            pid,
            generation,
            control: control_tx,
            task,
        });

        Ok(pid)
    }

    fn signal(&mut self, signal: Signal) -> Result<bool> {
        let Some(current) = &self.current else {
            debug!(%signal, "no child process; dropping signal");
            return Ok(false);
        };
        if current.control.send(ChildControl::Signal(signal)).is_err() {
            debug!(pid = current.pid, %signal, "child already exited; dropping signal");
            return Ok(false);
        }
        Ok(true)
    }

    fn stop(&mut self, grace: Duration) -> SupervisorFuture<'_, Option<ExitOutcome>> {
        let kill_signal = self.config.kill_signal;
        let current = self.current.take();

        Box::pin(async move {
            let Some(current) = current else {
                return Ok(None);
            };

            let (done_tx, done_rx) = oneshot::channel();
            let request = ChildControl::Stop {
                signal: kill_signal,
                grace,
                done: done_tx,
            };

            if current.control.send(request).is_err() {
                debug!(pid = current.pid, "child already exited before stop");
                return Ok(None);
            }

            match done_rx.await {
                Ok(outcome) => {
                    if let Err(e) = current.task.await {
                        warn!(pid = current.pid, error = %e, "child supervision task failed");
                    }
                    Ok(Some(outcome))
                }
                // The child exited on its own while the stop was in flight; it
                // has already been reaped and its exit is reported as stale.
                Err(_) => {
                    debug!(pid = current.pid, "child exited while being stopped");
                    Ok(None)
                }
            }
        })
    }

    fn current_pid(&self) -> Option<u32> {
        self.current
            .as_ref()
            .filter(|c| !c.task.is_finished())
            .map(|c| c.pid)
    }
}
