//! Commit-to-delivery handoff
//!
//! Commands commit on whatever context submitted them (an HTTP worker, a
//! WebSocket task, the scheduler); snapshots are delivered to clients on the
//! cooperative broadcast loop. `StateBridge` joins the two: `notify` is
//! synchronous, thread-safe, and never waits for delivery.
//!
//! The channel holds exactly one pending snapshot. If the delivery side is
//! momentarily behind, a newer commit replaces the pending one instead of
//! queuing: intermediate states are stale by definition, only the latest
//! version carries meaningful state. The slot is version-guarded, so
//! subscribers observe committed versions in strictly increasing order,
//! possibly with gaps, even when submitters race.

use crate::state::Snapshot;
use std::sync::Arc;
use tokio::sync::watch;

/// Single-slot, coalescing bridge from the command path to the delivery loop.
#[derive(Clone)]
pub struct StateBridge {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl StateBridge {
    /// Create a bridge seeded with the current state. The seed value is not
    /// delivered to subscribers; connect-time catch-up comes from the
    /// registry, not from here.
    pub fn new(initial: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Hand a committed snapshot to the delivery side. Never blocks; a
    /// pending undelivered snapshot is replaced.
    ///
    /// Commits race here outside the store lock, so two submitters can
    /// arrive with their notifies inverted. The slot only ever moves
    /// forward: a notify carrying an older version than the slot is dropped,
    /// its state already superseded.
    pub fn notify(&self, snapshot: Snapshot) {
        self.tx.send_if_modified(|slot| {
            if snapshot.version > slot.version {
                *slot = snapshot;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to committed snapshots (broadcast loop, scheduler).
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }
}
