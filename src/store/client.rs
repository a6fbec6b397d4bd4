// src/store/client.rs

//! Pluggable store client abstraction.
//!
//! Watchers talk to a `StoreClient` instead of a concrete HTTP client, so
//! tests can swap in a scripted in-memory store while production uses
//! [`ConsulClient`](super::ConsulClient).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{KvSnapshot, Prefix};
use crate::errors::Result;

/// Boxed future returned by [`StoreClient::blocking_read`].
pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = Result<KvSnapshot>> + Send + 'a>>;

/// Per-request options for a blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Return once the store index moves past this value (0 = immediately).
    pub since_index: u64,
    /// Allow any replica to answer, not just the leader.
    pub allow_stale: bool,
    /// Upper bound the store should hold the request open for.
    pub wait: Duration,
}

/// Trait abstracting "read with minimum index, block until changed or timeout".
///
/// Implementations return the full snapshot of the prefix together with the
/// index it reflects. Any error is treated by callers as retryable.
pub trait StoreClient: Send + Sync {
    fn blocking_read<'a>(&'a self, prefix: &'a Prefix, options: ReadOptions) -> StoreFuture<'a>;
}
