//! WebSocket client surface
//!
//! Clients connect at `GET /ws?role=controller|viewer`. Every client receives
//! a catch-up snapshot on connect and one snapshot per committed state change
//! (coalesced under backpressure). Controllers may additionally submit
//! commands as JSON text frames.

pub mod registry;
pub mod session;

pub use registry::{spawn_broadcast_loop, ClientInfo, ClientRegistry, RegistryFull, Role};

use crate::api::AppContext;
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tracing::warn;

/// GET /ws - WebSocket upgrade
pub async fn ws_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let role = match params.get("role").map(String::as_str) {
        Some("controller") => Role::Controller,
        _ => Role::Viewer,
    };

    if ctx.registry.is_full() {
        warn!("rejecting connect: client limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "client limit reached").into_response();
    }

    ws.on_upgrade(move |socket| session::run(socket, ctx, role))
}
