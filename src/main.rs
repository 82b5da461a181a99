//! presentd - Main entry point
//!
//! Real-time slideshow synchronization server: HTTP command API plus a
//! WebSocket delivery surface that keeps every connected display and
//! controller on the same playback state.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presentd::api::{create_router, AppContext};
use presentd::bridge::StateBridge;
use presentd::command::CommandRouter;
use presentd::config::{Config, ConfigOverrides};
use presentd::content::SlideLibrary;
use presentd::scheduler;
use presentd::state::StateStore;
use presentd::ws::{spawn_broadcast_loop, ClientRegistry};

/// Command-line arguments for presentd
#[derive(Parser, Debug)]
#[command(name = "presentd")]
#[command(about = "Real-time slideshow synchronization server")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "PRESENTD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PRESENTD_PORT")]
    port: Option<u16>,

    /// Directory containing slideshow JSON files
    #[arg(short, long, env = "PRESENTD_SLIDESHOWS_DIR")]
    slideshows_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presentd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            port: args.port,
            slideshows_dir: args.slideshows_dir,
        },
    )
    .context("Failed to load configuration")?;

    info!("Starting presentd on port {}", config.port);
    info!("Slideshows directory: {}", config.slideshows_dir.display());

    // Content library
    let library = Arc::new(
        SlideLibrary::open(&config.slideshows_dir, config.default_slide_duration())
            .context("Failed to open slideshow library")?,
    );

    // State core: store -> bridge -> router
    let store = Arc::new(StateStore::new(Arc::clone(&library)));
    let bridge = StateBridge::new(store.snapshot());
    let router = Arc::new(CommandRouter::new(Arc::clone(&store), bridge.clone()));

    // Delivery side: registry + broadcast loop + auto-advance scheduler
    let registry = Arc::new(ClientRegistry::new(config.max_clients));
    spawn_broadcast_loop(Arc::clone(&registry), bridge.subscribe());
    scheduler::spawn(Arc::clone(&router), Arc::clone(&library), bridge.subscribe());

    // Build the application router
    let ctx = AppContext {
        store,
        router,
        library,
        registry,
        heartbeat_timeout: config.heartbeat_timeout(),
    };
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
