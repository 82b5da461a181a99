//! Auto-advance scheduler
//!
//! A single cooperative loop that arms at most one timer at a time. Every
//! committed state observed through the bridge re-evaluates the timer: if the
//! new state is playing, a deadline is armed at
//! `slide_started_at + slide_duration`, tagged with that commit's version;
//! otherwise the scheduler goes idle. When the deadline fires it submits
//! `AdvanceTimerFired` through the command router, and the store's version
//! check turns any fire that raced a newer commit into a no-op. Cancellation
//! therefore never depends on revoking an in-flight timer.
//!
//! Slide duration is read from the library at arm time, not at fire time, so
//! the fire path touches nothing but the router.

use crate::command::{Command, CommandRouter};
use crate::content::SlideLibrary;
use crate::state::Snapshot;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Spawn the scheduler loop. It runs until the bridge sender is dropped.
pub fn spawn(
    router: Arc<CommandRouter>,
    library: Arc<SlideLibrary>,
    rx: watch::Receiver<Snapshot>,
) -> JoinHandle<()> {
    tokio::spawn(run(router, library, rx))
}

async fn run(
    router: Arc<CommandRouter>,
    library: Arc<SlideLibrary>,
    mut rx: watch::Receiver<Snapshot>,
) {
    loop {
        let snapshot = rx.borrow_and_update().clone();

        let Some((armed_version, due)) = arm(&library, &snapshot) else {
            trace!("scheduler idle");
            if rx.changed().await.is_err() {
                break;
            }
            continue;
        };

        debug!(
            version = armed_version,
            slide = snapshot.slide_index,
            "auto-advance armed"
        );

        tokio::select! {
            changed = rx.changed() => {
                // A newer commit supersedes the armed timer; re-evaluate.
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep_until(due) => {
                debug!(version = armed_version, "auto-advance fired");
                let _ = router.submit(Command::AdvanceTimerFired {
                    expected_version: armed_version,
                });
                // A current fire commits a new version; a stale fire means
                // someone else already committed one. Either way the bridge
                // has (or will have) a newer snapshot, so this cannot hang.
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("scheduler stopped");
}

/// Compute the armed deadline for a committed state, or `None` when idle.
fn arm(library: &SlideLibrary, snapshot: &Snapshot) -> Option<(u64, Instant)> {
    if !snapshot.playing {
        return None;
    }
    let show_id = snapshot.slideshow_id.as_deref()?;

    let duration = library.slide_duration(show_id, snapshot.slide_index);
    let elapsed = (Utc::now() - snapshot.slide_started_at)
        .to_std()
        .unwrap_or(Duration::ZERO);
    let remaining = duration.saturating_sub(elapsed);
    Some((snapshot.version, Instant::now() + remaining))
}
