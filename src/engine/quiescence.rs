// src/engine/quiescence.rs

use tokio::time::Instant;
use tracing::trace;

use crate::config::WaitBounds;
use crate::env::EnvironmentMap;

/// "The environment has been stable long enough to apply."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuiescentEvent {
    pub at: Instant,
    pub env: EnvironmentMap,
}

#[derive(Debug, Clone)]
struct PendingBurst {
    env: EnvironmentMap,
    first_update: Instant,
    last_update: Instant,
}

/// Collapses a burst of environment updates into a single flush.
///
/// The timer is driven with explicit instants and never sleeps itself; the
/// runtime sleeps until [`deadline`](Self::deadline) and then calls
/// [`poll`](Self::poll).
///
/// A burst flushes at whichever comes first:
/// - `min` after the most recent update, or
/// - `max` after the first un-flushed update (when a ceiling is configured).
#[derive(Debug, Clone)]
pub struct QuiescenceTimer {
    bounds: WaitBounds,
    pending: Option<PendingBurst>,
}

impl QuiescenceTimer {
    pub fn new(bounds: WaitBounds) -> Self {
        Self {
            bounds,
            pending: None,
        }
    }

    pub fn bounds(&self) -> WaitBounds {
        self.bounds
    }

    /// True while a countdown is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a freshly merged environment and restart the `min` countdown.
    pub fn observe(&mut self, now: Instant, env: EnvironmentMap) {
        match &mut self.pending {
            Some(burst) => {
                burst.env = env;
                burst.last_update = now;
            }
            None => {
                self.pending = Some(PendingBurst {
                    env,
                    first_update: now,
                    last_update: now,
                });
            }
        }
        trace!(deadline = ?self.deadline(), "quiescence countdown (re)started");
    }

    /// When the pending burst should be flushed, if any.
    pub fn deadline(&self) -> Option<Instant> {
        let burst = self.pending.as_ref()?;
        let quiet = burst.last_update + self.bounds.min;
        Some(match self.bounds.ceiling() {
            Some(max) => quiet.min(burst.first_update + max),
            None => quiet,
        })
    }

    /// Flush the pending burst if its deadline has been reached.
    pub fn poll(&mut self, now: Instant) -> Option<QuiescentEvent> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.pending
            .take()
            .map(|burst| QuiescentEvent { at: now, env: burst.env })
    }

    /// Drop any in-flight countdown without emitting.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
