use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::Notify;

use envconsul::errors::{EnvconsulError, Result};
use envconsul::store::{KvSnapshot, Prefix, ReadOptions, StoreClient, StoreFuture};

/// One blocking read as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub prefix: String,
    pub since_index: u64,
    pub allow_stale: bool,
}

/// Scripted in-memory store.
///
/// - Each prefix (keyed by its `Display` form) has a queue of responses.
/// - A read pops the next response; with nothing queued it blocks until one
///   is pushed, like a long-poll that never times out.
/// - Every read is recorded so tests can assert on indices.
#[derive(Default)]
pub struct FakeStore {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<KvSnapshot, String>>>>,
    reads: Mutex<Vec<ReadRecord>>,
    pushed: Notify,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, prefix: &str, snapshot: KvSnapshot) {
        self.enqueue(prefix, Ok(snapshot));
    }

    pub fn push_error(&self, prefix: &str, message: &str) {
        self.enqueue(prefix, Err(message.to_string()));
    }

    pub fn reads(&self) -> Vec<ReadRecord> {
        self.reads.lock().unwrap().clone()
    }

    /// Indices requested for `prefix`, in order.
    pub fn indices_for(&self, prefix: &str) -> Vec<u64> {
        self.reads()
            .into_iter()
            .filter(|r| r.prefix == prefix)
            .map(|r| r.since_index)
            .collect()
    }

    fn enqueue(&self, prefix: &str, response: std::result::Result<KvSnapshot, String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(prefix.to_string())
            .or_default()
            .push_back(response);
        self.pushed.notify_waiters();
    }

    fn pop(&self, prefix: &str) -> Option<std::result::Result<KvSnapshot, String>> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(prefix)
            .and_then(VecDeque::pop_front)
    }

    async fn read(&self, prefix: &Prefix, options: ReadOptions) -> Result<KvSnapshot> {
        let key = prefix.to_string();
        self.reads.lock().unwrap().push(ReadRecord {
            prefix: key.clone(),
            since_index: options.since_index,
            allow_stale: options.allow_stale,
        });

        loop {
            let notified = self.pushed.notified();
            if let Some(response) = self.pop(&key) {
                return response.map_err(EnvconsulError::StoreError);
            }
            notified.await;
        }
    }
}

impl StoreClient for FakeStore {
    fn blocking_read<'a>(&'a self, prefix: &'a Prefix, options: ReadOptions) -> StoreFuture<'a> {
        Box::pin(self.read(prefix, options))
    }
}
