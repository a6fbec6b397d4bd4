// src/engine/runner.rs

use std::sync::Arc;

use nix::sys::signal::Signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::runtime::Runtime;
use crate::engine::{RunnerNotice, RunnerOptions, RuntimeEvent};
use crate::exec::Supervisor;
use crate::store::StoreClient;

/// Capacity of the runtime event channel shared by watchers and the
/// supervisor.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Cheap, cloneable way to steer a running [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    shutdown: CancellationToken,
    control: mpsc::UnboundedSender<RuntimeEvent>,
}

impl RunnerHandle {
    /// Ask the runner to stop. Safe to call more than once.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Relay `signal` to the current child, if there is one.
    ///
    /// Signals are queued in order and handled ahead of watcher events. A
    /// signal sent after the runner has exited is dropped.
    pub fn forward_signal(&self, signal: Signal) {
        if self.control.send(RuntimeEvent::ForwardSignal(signal)).is_err() {
            debug!(%signal, "runner has exited; signal dropped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// A started runner: its handle, the notice stream, and the task driving it.
pub struct Runner {
    pub handle: RunnerHandle,
    pub notices: mpsc::UnboundedReceiver<RunnerNotice>,
    pub join: JoinHandle<()>,
}

impl Runner {
    /// Start watching and supervising on the current tokio runtime.
    ///
    /// `make_supervisor` receives the runtime event sender so the supervisor
    /// can report child exits back into the loop.
    pub fn start<S, F>(options: RunnerOptions, store: Arc<dyn StoreClient>, make_supervisor: F) -> Self
    where
        S: Supervisor + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> S,
    {
        let (event_tx, event_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let supervisor = make_supervisor(event_tx.clone());

        debug!(
            prefixes = options.prefixes.len(),
            once = options.once,
            wait = %options.wait,
            "starting runner"
        );

        let runtime = Runtime::new(
            options,
            event_rx,
            control_rx,
            event_tx,
            supervisor,
            store,
            notice_tx,
            shutdown.clone(),
        );
        let join = tokio::spawn(runtime.run());

        Self {
            handle: RunnerHandle {
                shutdown,
                control: control_tx,
            },
            notices: notice_rx,
            join,
        }
    }

    pub fn handle(&self) -> RunnerHandle {
        self.handle.clone()
    }

    /// Wait for the next notice. `None` once the runner has exited and every
    /// notice has been drained.
    pub async fn next_notice(&mut self) -> Option<RunnerNotice> {
        self.notices.recv().await
    }

    /// Stop the runner and wait for its task to finish.
    pub async fn shutdown(self) {
        self.handle.stop();
        if let Err(e) = self.join.await {
            warn!(error = %e, "runner task failed");
        }
    }
}
