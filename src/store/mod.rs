// src/store/mod.rs

//! Key/value store access.
//!
//! This module is responsible for:
//! - Parsing and normalizing watched prefixes (`prefix.rs`).
//! - The [`StoreClient`] seam used to issue blocking reads (`client.rs`),
//!   with a Consul HTTP implementation (`consul.rs`).
//! - One long-poll loop per prefix that turns store changes into
//!   [`KvSnapshot`]s for the runner (`watcher.rs`).
//!
//! It does **not** know about environment variables or processes.

pub mod client;
pub mod consul;
pub mod prefix;
pub mod watcher;

use std::collections::BTreeMap;

pub use client::{ReadOptions, StoreClient, StoreFuture};
pub use consul::{ConsulClient, ConsulClientConfig};
pub use prefix::Prefix;
pub use watcher::{spawn_prefix_watcher, WatcherOptions};

/// Full state of one prefix at a given store index.
///
/// Keys are relative to the prefix. Values are raw bytes exactly as stored.
/// A snapshot is always replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvSnapshot {
    pub index: u64,
    pub pairs: BTreeMap<String, Vec<u8>>,
}

impl KvSnapshot {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            pairs: BTreeMap::new(),
        }
    }

    /// Builder-style insert, convenient for constructing snapshots in tests.
    pub fn with_pair(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.pairs.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
