//! HTTP request handlers
//!
//! Each command handler submits through the shared `CommandRouter` and maps
//! `CommandError` to a status code: unknown slideshow is 404, commands that
//! need a loaded show are 409, and the soft already-paused case is a 200 with
//! its own status string.

use crate::api::AppContext;
use crate::command::{Command, CommandError};
use crate::content::ShowSummary;
use crate::state::Snapshot;
use crate::ws::ClientInfo;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    pub slideshow_id: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: String,
    pub state: Snapshot,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SlideshowsResponse {
    pub slideshows: Vec<ShowSummary>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<ClientInfo>,
    pub count: usize,
}

type CommandResult = Result<Json<CommandResponse>, (StatusCode, Json<StatusResponse>)>;

fn committed(snapshot: Snapshot) -> CommandResult {
    Ok(Json(CommandResponse {
        status: "ok".to_string(),
        state: snapshot,
    }))
}

fn rejected(error: &CommandError) -> (StatusCode, Json<StatusResponse>) {
    let status = match error {
        CommandError::NoSuchSlideshow(_) => StatusCode::NOT_FOUND,
        CommandError::NothingLoaded => StatusCode::CONFLICT,
        CommandError::AlreadyPaused => StatusCode::CONFLICT,
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", error),
        }),
    )
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /api/v1/playback/load - Load a slideshow
pub async fn load(State(ctx): State<AppContext>, Json(req): Json<LoadRequest>) -> CommandResult {
    info!("Load request: {}", req.slideshow_id);
    match ctx.router.submit(Command::Load(req.slideshow_id)) {
        Ok(snapshot) => committed(snapshot),
        Err(e) => Err(rejected(&e)),
    }
}

/// POST /api/v1/playback/play - Start playback
pub async fn play(State(ctx): State<AppContext>) -> CommandResult {
    match ctx.router.submit(Command::Play) {
        Ok(snapshot) => committed(snapshot),
        Err(e) => Err(rejected(&e)),
    }
}

/// POST /api/v1/playback/pause - Pause playback
///
/// Pausing an already-paused show is informational, not a failure: the
/// current state comes back with status `already_paused`.
pub async fn pause(State(ctx): State<AppContext>) -> CommandResult {
    match ctx.router.submit(Command::Pause) {
        Ok(snapshot) => committed(snapshot),
        Err(CommandError::AlreadyPaused) => Ok(Json(CommandResponse {
            status: "already_paused".to_string(),
            state: ctx.store.snapshot(),
        })),
        Err(e) => Err(rejected(&e)),
    }
}

/// POST /api/v1/playback/next - Advance one slide
pub async fn next(State(ctx): State<AppContext>) -> CommandResult {
    match ctx.router.submit(Command::Next) {
        Ok(snapshot) => committed(snapshot),
        Err(e) => Err(rejected(&e)),
    }
}

/// POST /api/v1/playback/previous - Go back one slide
pub async fn previous(State(ctx): State<AppContext>) -> CommandResult {
    match ctx.router.submit(Command::Prev) {
        Ok(snapshot) => committed(snapshot),
        Err(e) => Err(rejected(&e)),
    }
}

/// GET /api/v1/playback/state - Current playback snapshot
pub async fn get_state(State(ctx): State<AppContext>) -> Json<Snapshot> {
    Json(ctx.store.snapshot())
}

// ============================================================================
// Slideshow Catalog Endpoints
// ============================================================================

/// GET /api/v1/slideshows - List available slideshows
pub async fn list_slideshows(State(ctx): State<AppContext>) -> Json<SlideshowsResponse> {
    Json(SlideshowsResponse {
        slideshows: ctx.library.list(),
    })
}

/// POST /api/v1/slideshows/refresh - Rescan the slideshow directory
pub async fn refresh_slideshows(
    State(ctx): State<AppContext>,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<StatusResponse>)> {
    match ctx.library.refresh() {
        Ok(count) => {
            info!("Library refreshed: {} shows", count);
            ctx.registry.broadcast_catalog(&ctx.library.list());
            Ok(Json(RefreshResponse {
                status: "ok".to_string(),
                count,
            }))
        }
        Err(e) => {
            error!("Library refresh failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            ))
        }
    }
}

// ============================================================================
// Client Endpoints
// ============================================================================

/// GET /api/v1/clients - Connected client summary
pub async fn get_clients(State(ctx): State<AppContext>) -> Json<ClientsResponse> {
    let clients = ctx.registry.clients();
    let count = clients.len();
    Json(ClientsResponse { clients, count })
}
