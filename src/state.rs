//! Canonical playback state
//!
//! `StateStore` owns the single `PlaybackState` instance and its monotonic
//! version. Every mutation goes through `apply`, which holds one mutex for
//! the duration of the transition, so commands from HTTP handlers, WebSocket
//! controllers, and the auto-advance scheduler are total-ordered no matter
//! which scheduling domain issued them. `apply` never awaits and never does
//! I/O beyond the in-memory catalog lookup, so holding the lock is cheap.

use crate::command::{Command, CommandError};
use crate::content::SlideLibrary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// The canonical playback state. Exactly one instance exists per process.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    /// Strictly increases by 1 per committed mutation, starting at 0
    pub version: u64,
    pub slideshow_id: Option<String>,
    /// Slide count snapshotted at load time; bounds checks never re-query
    /// the content library
    pub slide_count: usize,
    pub slide_index: usize,
    pub playing: bool,
    pub slide_started_at: DateTime<Utc>,
    /// Loop flag copied from the slideshow config at load time
    pub loop_enabled: bool,
}

impl PlaybackState {
    fn new() -> Self {
        Self {
            version: 0,
            slideshow_id: None,
            slide_count: 0,
            slide_index: 0,
            playing: false,
            slide_started_at: Utc::now(),
            loop_enabled: false,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            slideshow_id: self.slideshow_id.clone(),
            slide_index: self.slide_index,
            slide_count: self.slide_count,
            playing: self.playing,
            slide_started_at: self.slide_started_at,
        }
    }
}

/// Immutable full-state copy sent to clients. Always a complete snapshot,
/// never a delta; safe to share across connections after construction.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub slideshow_id: Option<String>,
    pub slide_index: usize,
    pub slide_count: usize,
    pub playing: bool,
    pub slide_started_at: DateTime<Utc>,
}

/// Result of a successful `apply`
#[derive(Debug, Clone)]
pub enum Applied {
    /// The command mutated state; version was bumped by exactly 1
    Committed(Snapshot),
    /// Stale auto-advance fire absorbed by the version check; state untouched
    Ignored,
}

/// Owns the canonical playback state behind a single mutual-exclusion
/// boundary (one `std::sync::Mutex`, usable from blocking and async contexts
/// alike since `apply` is synchronous and short).
pub struct StateStore {
    inner: Mutex<PlaybackState>,
    library: Arc<SlideLibrary>,
}

impl StateStore {
    pub fn new(library: Arc<SlideLibrary>) -> Self {
        Self {
            inner: Mutex::new(PlaybackState::new()),
            library,
        }
    }

    /// Snapshot of the current state, used to catch up newly connected
    /// clients and to answer state queries.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().unwrap().snapshot()
    }

    /// Apply one command atomically.
    ///
    /// On error the state and version are untouched. On `Committed` the
    /// returned snapshot's version is exactly `prior_version + 1`.
    pub fn apply(&self, command: Command) -> Result<Applied, CommandError> {
        let mut state = self.inner.lock().unwrap();

        match command {
            Command::Load(id) => {
                let show = self
                    .library
                    .resolve(&id)
                    .ok_or(CommandError::NoSuchSlideshow(id))?;
                state.slideshow_id = Some(show.id);
                state.slide_count = show.slide_count;
                state.loop_enabled = show.loop_enabled;
                state.slide_index = 0;
                state.playing = false;
                state.slide_started_at = Utc::now();
            }
            Command::Play => {
                if state.slideshow_id.is_none() {
                    return Err(CommandError::NothingLoaded);
                }
                state.playing = true;
                state.slide_started_at = Utc::now();
            }
            Command::Pause => {
                if !state.playing {
                    return Err(CommandError::AlreadyPaused);
                }
                state.playing = false;
            }
            Command::Next => {
                if state.slideshow_id.is_none() {
                    return Err(CommandError::NothingLoaded);
                }
                Self::step_forward(&mut state);
            }
            Command::Prev => {
                if state.slideshow_id.is_none() {
                    return Err(CommandError::NothingLoaded);
                }
                Self::step_backward(&mut state);
            }
            Command::SetSlide(index) => {
                if state.slideshow_id.is_none() {
                    return Err(CommandError::NothingLoaded);
                }
                if index >= state.slide_count {
                    // Out-of-range jumps are dropped without a commit
                    return Ok(Applied::Ignored);
                }
                state.slide_index = index;
                state.slide_started_at = Utc::now();
            }
            Command::AdvanceTimerFired { expected_version } => {
                // Race guard: a fire armed against an older version is a
                // superseded timer, not an error.
                if expected_version != state.version || state.slideshow_id.is_none() {
                    return Ok(Applied::Ignored);
                }
                Self::step_forward(&mut state);
            }
        }

        state.version += 1;
        Ok(Applied::Committed(state.snapshot()))
    }

    fn step_forward(state: &mut PlaybackState) {
        let last = state.slide_count.saturating_sub(1);
        if state.slide_index >= last {
            if state.loop_enabled {
                state.slide_index = 0;
            } else {
                // End of a non-looping show stops playback; the index stays
                // on the last valid slide.
                state.slide_index = last;
                state.playing = false;
            }
        } else {
            state.slide_index += 1;
        }
        state.slide_started_at = Utc::now();
    }

    fn step_backward(state: &mut PlaybackState) {
        if state.slide_index == 0 {
            if state.loop_enabled {
                state.slide_index = state.slide_count.saturating_sub(1);
            }
            // Non-looping shows clamp at the first slide; playback continues.
        } else {
            state.slide_index -= 1;
        }
        state.slide_started_at = Utc::now();
    }
}
