//! REST API and router assembly
//!
//! Implements the command surface consumed by controller UIs, plus state and
//! catalog queries. WebSocket delivery lives in `crate::ws`; handlers here
//! only commit commands and answer queries.

pub mod handlers;

use crate::command::CommandRouter;
use crate::content::SlideLibrary;
use crate::state::StateStore;
use crate::ws::ClientRegistry;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<StateStore>,
    pub router: Arc<CommandRouter>,
    pub library: Arc<SlideLibrary>,
    pub registry: Arc<ClientRegistry>,
    pub heartbeat_timeout: Duration,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))

        // WebSocket client surface
        .route("/ws", get(crate::ws::ws_handler))

        // API v1 routes
        .nest("/api/v1", Router::new()
            // Playback control endpoints
            .route("/playback/load", post(handlers::load))
            .route("/playback/play", post(handlers::play))
            .route("/playback/pause", post(handlers::pause))
            .route("/playback/next", post(handlers::next))
            .route("/playback/previous", post(handlers::previous))
            .route("/playback/state", get(handlers::get_state))

            // Slideshow catalog endpoints
            .route("/slideshows", get(handlers::list_slideshows))
            .route("/slideshows/refresh", post(handlers::refresh_slideshows))

            // Connected clients
            .route("/clients", get(handlers::get_clients))
        )
        .with_state(ctx)

        // Enable CORS for local controller/viewer pages
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "presentd",
        "version": env!("CARGO_PKG_VERSION"),
        "clients": ctx.registry.client_count(),
    }))
}
