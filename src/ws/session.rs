//! WebSocket session task
//!
//! One task per connection. The select loop interleaves three concerns:
//! snapshot delivery from this connection's coalescing slot, inbound frames
//! (controller commands and heartbeats), and the heartbeat deadline. Any send
//! failure or missed heartbeat ends the session; cleanup prunes only this
//! connection, and a reconnecting client is caught up by the connect-time
//! snapshot.

use crate::api::AppContext;
use crate::command::Command;
use crate::content::ShowSummary;
use crate::state::Snapshot;
use crate::ws::registry::Role;
use axum::extract::ws::{Message, WebSocket};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound frame
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    StateUpdate {
        #[serde(flatten)]
        snapshot: &'a Snapshot,
    },
    SlideshowsUpdate {
        slideshows: &'a [ShowSummary],
    },
    Error {
        message: String,
    },
}

/// Inbound frame: `{"command": "...", "params": {...}}`
#[derive(Debug, Deserialize)]
struct ClientMessage {
    command: String,
    #[serde(default)]
    params: serde_json::Value,
}

pub async fn run(mut socket: WebSocket, ctx: AppContext, role: Role) {
    // The seed is read inside `add`, under the registry lock, so no commit
    // broadcast before the insert can be missed.
    let (client_id, mut slot, mut catalog) =
        match ctx.registry.add(role, || ctx.store.snapshot()) {
            Ok(added) => added,
            Err(e) => {
                warn!("connect rejected: {}", e);
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };

    // Catch-up: the slot was seeded with the current state
    let initial = slot.borrow_and_update().clone();
    if send_snapshot(&mut socket, &initial).await.is_err() {
        ctx.registry.remove(client_id);
        return;
    }

    let mut last_activity = Instant::now();
    let mut heartbeat = interval(heartbeat_check_period(ctx.heartbeat_timeout));

    loop {
        tokio::select! {
            changed = slot.changed() => {
                if changed.is_err() {
                    // Registry dropped our slot
                    break;
                }
                let snapshot = slot.borrow_and_update().clone();
                if send_snapshot(&mut socket, &snapshot).await.is_err() {
                    debug!(client = %client_id, "send failed, closing session");
                    break;
                }
            }

            changed = catalog.changed() => {
                if changed.is_err() {
                    break;
                }
                let shows = catalog.borrow_and_update().clone();
                let reply = ServerMessage::SlideshowsUpdate { slideshows: &shows };
                if send_message(&mut socket, &reply).await.is_err() {
                    debug!(client = %client_id, "send failed, closing session");
                    break;
                }
            }

            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                last_activity = Instant::now();
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = handle_frame(&ctx, client_id, role, &text) {
                            if send_message(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    // Ping/Pong/Binary count as activity only
                    _ => {}
                }
            }

            _ = heartbeat.tick() => {
                if last_activity.elapsed() > ctx.heartbeat_timeout {
                    info!(client = %client_id, "heartbeat missed, closing session");
                    break;
                }
            }
        }
    }

    ctx.registry.remove(client_id);
}

fn heartbeat_check_period(timeout: Duration) -> Duration {
    (timeout / 2).max(Duration::from_millis(50))
}

/// Process one inbound text frame, returning an error frame for the sender
/// when the command is rejected. Malformed frames and viewer commands are
/// logged and dropped; both are client bugs, not session failures.
fn handle_frame(
    ctx: &AppContext,
    client_id: Uuid,
    role: Role,
    text: &str,
) -> Option<ServerMessage<'static>> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(client = %client_id, error = %e, "invalid frame");
            return None;
        }
    };

    if msg.command == "heartbeat" {
        return None;
    }

    if role != Role::Controller {
        debug!(client = %client_id, command = %msg.command, "ignoring viewer command");
        return None;
    }

    let command = match msg.command.as_str() {
        "load_slideshow" => {
            let id = msg
                .params
                .get("slideshow_id")
                .or_else(|| msg.params.get("id"))
                .and_then(|v| v.as_str());
            match id {
                Some(id) => Command::Load(id.to_string()),
                None => {
                    return Some(ServerMessage::Error {
                        message: "slideshow_id required".to_string(),
                    })
                }
            }
        }
        "set_slide" => {
            let index = msg.params.get("slide").and_then(|v| v.as_u64());
            match index {
                Some(index) => Command::SetSlide(index as usize),
                None => {
                    return Some(ServerMessage::Error {
                        message: "slide required".to_string(),
                    })
                }
            }
        }
        "play" => Command::Play,
        "pause" => Command::Pause,
        "next_slide" => Command::Next,
        "prev_slide" => Command::Prev,
        "refresh_slideshows" => {
            if let Err(e) = ctx.library.refresh() {
                warn!(client = %client_id, "library refresh failed: {}", e);
                return Some(ServerMessage::Error {
                    message: format!("refresh failed: {}", e),
                });
            }
            // Every client sees the new catalog, not just the requester
            ctx.registry.broadcast_catalog(&ctx.library.list());
            return None;
        }
        other => {
            warn!(client = %client_id, command = %other, "unknown command");
            return Some(ServerMessage::Error {
                message: format!("unknown command: {}", other),
            });
        }
    };

    match ctx.router.submit(command) {
        Ok(_) => None,
        Err(e) => Some(ServerMessage::Error {
            message: e.to_string(),
        }),
    }
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &Snapshot) -> Result<(), ()> {
    send_message(socket, &ServerMessage::StateUpdate { snapshot }).await
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage<'_>) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to serialize outbound frame: {}", e);
            return Err(());
        }
    };
    socket.send(Message::Text(json)).await.map_err(|_| ())
}
