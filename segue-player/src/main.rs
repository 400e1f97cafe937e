//! Segue Player - Main entry point
//!
//! Playback daemon with dual-channel crossfading, silence skipping, and
//! an HTTP/SSE control surface. Pointing it at a library server enables
//! search, server playlists and remote track streaming.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use segue_player::api::{self, AppContext};
use segue_player::audio::RodioSink;
use segue_player::config::{Config, Overrides};
use segue_player::playback::{ChannelPair, PlaybackController};
use segue_player::remote::RemoteClient;
use segue_player::SharedState;

/// Command-line arguments for segue-player
#[derive(Parser, Debug)]
#[command(name = "segue-player")]
#[command(about = "Playback daemon with crossfade and silence skip")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "SEGUE_PORT")]
    port: Option<u16>,

    /// Base URL of the library server, e.g. http://192.168.1.20:5000
    #[arg(short, long, env = "SEGUE_SERVER")]
    server: Option<String>,

    /// Directory remote tracks are spooled into
    #[arg(long, env = "SEGUE_SPOOL_DIR")]
    spool_dir: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, env = "SEGUE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segue_player=debug,segue_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::resolve(
        Overrides {
            port: args.port,
            server_url: args.server,
            spool_dir: args.spool_dir,
        },
        args.config.as_deref(),
    )
    .context("Failed to resolve configuration")?;

    info!("Starting Segue Player on port {}", config.port);
    match &config.server_url {
        Some(url) => info!("Library server: {}", url),
        None => info!("No library server configured; local playback only"),
    }

    std::fs::create_dir_all(&config.spool_dir)
        .with_context(|| format!("Failed to create spool dir {}", config.spool_dir.display()))?;

    // The output stream must outlive the sinks and is not Send, so it
    // lives on the main task for the whole run.
    let (_stream, stream_handle) =
        rodio::OutputStream::try_default().context("Failed to open audio output device")?;

    let channels = ChannelPair::new(
        Box::new(RodioSink::new(stream_handle.clone())),
        Box::new(RodioSink::new(stream_handle)),
    );

    let remote = match &config.server_url {
        Some(url) => Some(RemoteClient::new(url.clone()).context("Failed to build HTTP client")?),
        None => None,
    };

    let shared = Arc::new(SharedState::new());
    let (controller, handle) = PlaybackController::new(
        config.engine.clone(),
        channels,
        remote,
        config.spool_dir.clone(),
        Arc::clone(&shared),
    );
    tokio::spawn(controller.run());
    info!("Playback controller started");

    let ctx = AppContext {
        handle: handle.clone(),
        state: shared,
        port: config.port,
        server_url: config.server_url.clone(),
    };
    let app = api::router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    handle.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
