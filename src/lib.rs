//! # presentd
//!
//! Real-time slideshow playback synchronization server.
//!
//! **Purpose:** Hold the single canonical playback state, accept mutating
//! commands from HTTP handlers, WebSocket controllers, and a background
//! auto-advance scheduler, and fan consistent state snapshots out to every
//! connected display client, including late joiners.
//!
//! **Architecture:** One `StateStore` behind a mutex is the only shared
//! mutable state; commits flow through a single-slot coalescing bridge into
//! a cooperative delivery loop that owns all client connections and timers.

pub mod api;
pub mod bridge;
pub mod command;
pub mod config;
pub mod content;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod ws;

pub use bridge::StateBridge;
pub use command::{Command, CommandError, CommandRouter};
pub use error::{Error, Result};
pub use state::{Snapshot, StateStore};
