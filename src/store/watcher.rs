// src/store/watcher.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::engine::RuntimeEvent;
use crate::store::client::{ReadOptions, StoreClient};
use crate::store::Prefix;

/// Default time the store is asked to hold a blocking read open.
pub const DEFAULT_BLOCKING_WAIT: Duration = Duration::from_secs(60);

/// Knobs shared by all prefix watchers of one runner.
#[derive(Debug, Clone, Copy)]
pub struct WatcherOptions {
    /// Delay before reissuing a failed read.
    pub retry: Duration,
    /// Allow reads from non-leader replicas.
    pub allow_stale: bool,
    /// How long each blocking read may be held open by the store.
    pub blocking_wait: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            retry: Duration::from_secs(5),
            allow_stale: false,
            blocking_wait: DEFAULT_BLOCKING_WAIT,
        }
    }
}

/// Spawn the long-poll loop for a single prefix.
///
/// - The first read uses index 0, which returns the current state at once.
/// - Each successful read that moves the index forward is forwarded to the
///   runtime as `RuntimeEvent::SnapshotReceived`.
/// - A read that returns the same index is a timeout with no change and is
///   not forwarded.
/// - If the store index goes backwards (e.g. a restored snapshot), the floor is
///   reset to 0 so nothing is missed.
/// - After the first successful read the floor never drops below 1, since a
///   read at index 0 returns at once.
/// - Errors are logged and retried after `options.retry` with the same index,
///   forever. Only `shutdown` (or a closed runtime channel) ends the loop.
pub fn spawn_prefix_watcher(
    position: usize,
    prefix: Prefix,
    client: Arc<dyn StoreClient>,
    options: WatcherOptions,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(prefix = %prefix, "prefix watcher started");

        let mut last_index: u64 = 0;
        let mut received_data = false;

        loop {
            let read_options = ReadOptions {
                since_index: last_index,
                allow_stale: options.allow_stale,
                wait: options.blocking_wait,
            };

            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                res = client.blocking_read(&prefix, read_options) => res,
            };

            match result {
                Ok(snapshot) => {
                    let index = snapshot.index.max(1);

                    if index < last_index {
                        warn!(
                            prefix = %prefix,
                            previous = last_index,
                            current = snapshot.index,
                            "store index went backwards; resetting to 0"
                        );
                        last_index = 0;
                        continue;
                    }

                    if received_data && index == last_index {
                        trace!(prefix = %prefix, index = last_index, "blocking read timed out without changes");
                        continue;
                    }

                    last_index = index;
                    received_data = true;

                    debug!(
                        prefix = %prefix,
                        index = snapshot.index,
                        keys = snapshot.pairs.len(),
                        "received prefix snapshot"
                    );

                    let event = RuntimeEvent::SnapshotReceived { position, snapshot };
                    let sent = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        res = runtime_tx.send(event) => res,
                    };
                    if sent.is_err() {
                        debug!(prefix = %prefix, "runtime channel closed; stopping watcher");
                        break;
                    }
                }
                Err(err) => {
                    warn!(
                        prefix = %prefix,
                        index = last_index,
                        error = %err,
                        retry = ?options.retry,
                        "blocking read failed; retrying"
                    );

                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(options.retry) => {}
                    }
                }
            }
        }

        info!(prefix = %prefix, "prefix watcher stopped");
    })
}
