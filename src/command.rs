//! Command routing
//!
//! All playback mutations enter through `CommandRouter::submit`, whether they
//! come from an HTTP handler, a controller's WebSocket frame, or the
//! auto-advance scheduler. The router applies the command against the
//! `StateStore` and, on commit, pushes exactly one notification into the
//! bridge. Rejected commands and absorbed stale timer fires produce no
//! notification and no broadcast.

use crate::bridge::StateBridge;
use crate::state::{Applied, Snapshot, StateStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A playback mutation. Ephemeral; exists only while being routed.
#[derive(Debug, Clone)]
pub enum Command {
    Load(String),
    Play,
    Pause,
    Next,
    Prev,
    /// Jump to an explicit slide index; out-of-range jumps are dropped
    SetSlide(usize),
    /// Internal auto-advance, tagged with the version the timer was armed
    /// against. Absorbed silently when the tag is stale.
    AdvanceTimerFired { expected_version: u64 },
}

/// Command rejection reasons. All are local: they reject the one offending
/// command and leave state, version, and connections untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no slideshow named '{0}'")]
    NoSuchSlideshow(String),

    #[error("no slideshow is loaded")]
    NothingLoaded,

    /// Informational rather than a failure; callers may ignore it
    #[error("playback is already paused")]
    AlreadyPaused,
}

/// The single serialized command path into the state store.
pub struct CommandRouter {
    store: Arc<StateStore>,
    bridge: StateBridge,
}

impl CommandRouter {
    pub fn new(store: Arc<StateStore>, bridge: StateBridge) -> Self {
        Self { store, bridge }
    }

    /// Apply one command and fan out the result.
    ///
    /// Synchronous and non-blocking: the caller gets its result as soon as
    /// the state transition commits, without waiting for any delivery.
    pub fn submit(&self, command: Command) -> Result<Snapshot, CommandError> {
        match self.store.apply(command)? {
            Applied::Committed(snapshot) => {
                debug!(
                    version = snapshot.version,
                    slide = snapshot.slide_index,
                    playing = snapshot.playing,
                    "state committed"
                );
                self.bridge.notify(snapshot.clone());
                Ok(snapshot)
            }
            Applied::Ignored => {
                debug!("stale auto-advance absorbed");
                Ok(self.store.snapshot())
            }
        }
    }

    /// Current state without mutating anything.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }
}
