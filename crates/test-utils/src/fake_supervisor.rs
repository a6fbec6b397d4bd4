use std::sync::{Arc, Mutex};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::sync::{mpsc, Notify};

use envconsul::engine::RuntimeEvent;
use envconsul::env::EnvironmentMap;
use envconsul::errors::{EnvconsulError, Result};
use envconsul::exec::{ExitOutcome, Supervisor, SupervisorFuture};

/// Operations performed on a [`FakeSupervisor`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorOp {
    Spawn { generation: u64, env: EnvironmentMap },
    Stop { generation: u64 },
    Signal { generation: u64, signal: Signal },
}

#[derive(Default)]
struct LogState {
    ops: Vec<SupervisorOp>,
    current: Option<u64>,
    runtime_tx: Option<mpsc::Sender<RuntimeEvent>>,
    fail_spawns: bool,
    stop_delay: Duration,
}

/// Shared view of what a [`FakeSupervisor`] did, and a way to make its
/// "child" exit.
#[derive(Clone, Default)]
pub struct SupervisorLog {
    state: Arc<Mutex<LogState>>,
    changed: Arc<Notify>,
}

impl SupervisorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<SupervisorOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Environments passed to `spawn`, in order.
    pub fn spawned_envs(&self) -> Vec<EnvironmentMap> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SupervisorOp::Spawn { env, .. } => Some(env),
                _ => None,
            })
            .collect()
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.state.lock().unwrap().current
    }

    /// Make every following `spawn` fail.
    pub fn fail_spawns(&self, fail: bool) {
        self.state.lock().unwrap().fail_spawns = fail;
    }

    /// Make every following `stop` take `delay` before it completes, like a
    /// child that is slow to exit.
    pub fn set_stop_delay(&self, delay: Duration) {
        self.state.lock().unwrap().stop_delay = delay;
    }

    /// Wait until at least `count` operations have been recorded.
    pub async fn wait_for_ops(&self, count: usize) {
        loop {
            let notified = self.changed.notified();
            if self.state.lock().unwrap().ops.len() >= count {
                return;
            }
            notified.await;
        }
    }

    /// Report the current child as exited with `code`. Returns `false` if no
    /// child is running.
    pub async fn exit_current(&self, code: i32) -> bool {
        let (generation, tx) = {
            let mut state = self.state.lock().unwrap();
            let Some(generation) = state.current.take() else {
                return false;
            };
            let Some(tx) = state.runtime_tx.clone() else {
                return false;
            };
            (generation, tx)
        };
        tx.send(RuntimeEvent::ChildExited {
            generation,
            outcome: ExitOutcome::Code(code),
        })
        .await
        .is_ok()
    }

    fn record(&self, op: SupervisorOp) {
        self.state.lock().unwrap().ops.push(op);
        self.changed.notify_waiters();
    }
}

/// A supervisor that never starts a real process: it records every call in
/// a [`SupervisorLog`] and pretends each spawn succeeded.
pub struct FakeSupervisor {
    log: SupervisorLog,
    next_pid: u32,
}

impl FakeSupervisor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, log: SupervisorLog) -> Self {
        log.state.lock().unwrap().runtime_tx = Some(runtime_tx);
        Self { log, next_pid: 1000 }
    }
}

impl Supervisor for FakeSupervisor {
    fn spawn(&mut self, env: &EnvironmentMap, generation: u64) -> Result<u32> {
        {
            let mut state = self.log.state.lock().unwrap();
            if state.fail_spawns {
                return Err(EnvconsulError::SpawnError("fake spawn failure".to_string()));
            }
            state.current = Some(generation);
        }
        self.log.record(SupervisorOp::Spawn {
            generation,
            env: env.clone(),
        });
        self.next_pid += 1;
        Ok(self.next_pid)
    }

    fn signal(&mut self, signal: Signal) -> Result<bool> {
        let current = self.log.state.lock().unwrap().current;
        match current {
            Some(generation) => {
                self.log.record(SupervisorOp::Signal { generation, signal });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn stop(&mut self, _grace: Duration) -> SupervisorFuture<'_, Option<ExitOutcome>> {
        let (current, delay) = {
            let mut state = self.log.state.lock().unwrap();
            (state.current.take(), state.stop_delay)
        };
        if let Some(generation) = current {
            self.log.record(SupervisorOp::Stop { generation });
        }
        Box::pin(async move {
            if current.is_some() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(current.map(|_| ExitOutcome::Signaled(Signal::SIGTERM as i32)))
        })
    }

    fn current_pid(&self) -> Option<u32> {
        self.log
            .state
            .lock()
            .unwrap()
            .current
            .map(|_| self.next_pid)
    }
}
