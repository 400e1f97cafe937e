//! REST API for the playback daemon
//!
//! Control endpoints and the SSE event stream, all state-free: every
//! mutation goes through the [`PlayerHandle`] command channel and every
//! read comes from [`SharedState`].

pub mod handlers;
pub mod sse;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::playback::PlayerHandle;
use crate::state::SharedState;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub handle: PlayerHandle,
    pub state: Arc<SharedState>,
    /// Port the server listens on, echoed by the health endpoint
    pub port: u16,
    /// Configured remote library server, if any
    pub server_url: Option<String>,
}

/// Build the API router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                // Playback control
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/toggle", post(handlers::toggle))
                .route("/playback/stop", post(handlers::stop))
                .route("/playback/next", post(handlers::next))
                .route("/playback/previous", post(handlers::previous))
                .route("/playback/jump/:index", post(handlers::jump))
                .route("/playback/seek", post(handlers::seek))
                .route("/playback/status", get(handlers::status))
                // Playlist management
                .route("/playback/playlist", get(handlers::get_playlist))
                .route("/playback/playlist", post(handlers::replace_playlist))
                .route("/playback/playlist", delete(handlers::clear_playlist))
                .route("/playback/enqueue", post(handlers::enqueue))
                // Volume
                .route("/volume", get(handlers::get_volume))
                .route("/volume", post(handlers::set_volume))
                // Remote library operations (async; results arrive over SSE)
                .route("/search", post(handlers::search))
                .route("/playlists/refresh", post(handlers::refresh_playlists))
                .route("/playlists/:id/load", post(handlers::load_playlist))
                .route("/library/scan", post(handlers::scan_library))
                .route("/server/check", post(handlers::check_server))
                // SSE event stream
                .route("/events", get(sse::event_stream)),
        )
        .with_state(ctx)
        // Enable CORS for local UI access
        .layer(CorsLayer::permissive())
}
