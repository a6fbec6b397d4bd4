// src/env/merge.rs

use tracing::trace;

use crate::env::map::EnvironmentMap;
use crate::env::transform::KeyTransform;
use crate::store::KvSnapshot;

/// Holds the latest snapshot for every configured prefix and folds them into
/// one [`EnvironmentMap`].
///
/// Slots are indexed by prefix position. Later positions win on name
/// collisions, regardless of the order in which snapshots arrived. The full
/// map is recomputed on every update; there is no incremental diffing.
#[derive(Debug, Clone)]
pub struct Merger {
    transform: KeyTransform,
    snapshots: Vec<Option<KvSnapshot>>,
}

impl Merger {
    pub fn new(prefix_count: usize, transform: KeyTransform) -> Self {
        Self {
            transform,
            snapshots: vec![None; prefix_count],
        }
    }

    pub fn prefix_count(&self) -> usize {
        self.snapshots.len()
    }

    /// True once every prefix has produced at least one snapshot.
    pub fn all_received(&self) -> bool {
        self.snapshots.iter().all(Option::is_some)
    }

    /// Replace the snapshot of the prefix at `position` and return the newly
    /// merged environment.
    ///
    /// Each prefix has a single watcher feeding it in index order, so the
    /// incoming snapshot always supersedes the held one.
    pub fn update(&mut self, position: usize, snapshot: KvSnapshot) -> EnvironmentMap {
        match self.snapshots.get_mut(position) {
            Some(slot) => *slot = Some(snapshot),
            None => trace!(position, "snapshot for unknown prefix position ignored"),
        }
        self.merged()
    }

    /// Merge all current snapshots in prefix order. Missing snapshots count
    /// as empty.
    pub fn merged(&self) -> EnvironmentMap {
        let mut env = EnvironmentMap::new();
        for snapshot in self.snapshots.iter().flatten() {
            for (key, value) in &snapshot.pairs {
                env.insert(self.transform.apply(key), String::from_utf8_lossy(value));
            }
        }
        env
    }
}
