//! HTTP request handlers
//!
//! Thin adapters between HTTP and the controller's command channel.
//! Handlers never touch playback state directly; they send a command and
//! translate the reply into a status code.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use segue_common::events::PlaybackState;
use segue_common::Track;

use crate::api::AppContext;
use crate::error::{Error, TaskError};
use crate::state::PlayerStatus;
use crate::tasks::TaskTicket;

type ApiResult<T> = std::result::Result<T, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
    server_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    state: PlaybackState,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: f32,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: f32,
}

/// One entry in a playlist replace or enqueue request.
///
/// `remote: true` means the path is relative to the configured library
/// server; otherwise it is a local filesystem path.
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub path: String,
    #[serde(default)]
    pub remote: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplacePlaylistRequest {
    pub tracks: Vec<PlaylistItem>,
    #[serde(default)]
    pub autoplay: bool,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub tracks: Vec<PlaylistItem>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistCountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    count: usize,
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub column: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadPlaylistRequest {
    #[serde(default)]
    pub autoplay: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub folder_path: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map a controller error onto an HTTP status
fn error_response(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::TrackIndexOutOfRange { .. } | Error::SourceUnavailable(_) => StatusCode::NOT_FOUND,
        Error::TransitionBusy | Error::NothingPlaying => StatusCode::CONFLICT,
        Error::Config(_) | Error::PlayerGone(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Task(TaskError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        Error::Task(_) => StatusCode::BAD_GATEWAY,
        Error::Http(_) | Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn accepted(ticket: TaskTicket) -> (StatusCode, Json<TaskTicket>) {
    (StatusCode::ACCEPTED, Json(ticket))
}

/// Resolve request items into tracks, rejecting remote paths when no
/// server is configured
fn items_to_tracks(
    items: Vec<PlaylistItem>,
    server_url: Option<&str>,
) -> ApiResult<Vec<Track>> {
    items
        .into_iter()
        .map(|item| {
            if item.remote {
                match server_url {
                    Some(base) => Ok(Track::remote(base, item.path)),
                    None => Err(bad_request(
                        "remote track given but no library server configured",
                    )),
                }
            } else {
                Ok(Track::local(item.path))
            }
        })
        .collect()
}

// ============================================================================
// Health and status
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "segue-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
        server_url: ctx.server_url.clone(),
    })
}

/// GET /playback/status
pub async fn status(State(ctx): State<AppContext>) -> Json<PlayerStatus> {
    Json(ctx.state.status().await)
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /playback/play - resume, or start at an optional playlist index
pub async fn play(
    State(ctx): State<AppContext>,
    body: Option<Json<PlayRequest>>,
) -> ApiResult<Json<StatusResponse>> {
    let index = body.and_then(|Json(req)| req.index);
    ctx.handle.play(index).await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "playing".to_string(),
    }))
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.handle.pause().await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "paused".to_string(),
    }))
}

/// POST /playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> ApiResult<Json<ToggleResponse>> {
    let state = ctx.handle.toggle().await.map_err(error_response)?;
    Ok(Json(ToggleResponse { state }))
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.handle.stop().await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "stopped".to_string(),
    }))
}

/// POST /playback/next
pub async fn next(State(ctx): State<AppContext>) -> ApiResult<Json<IndexResponse>> {
    let index = ctx.handle.next().await.map_err(error_response)?;
    Ok(Json(IndexResponse { index }))
}

/// POST /playback/previous
pub async fn previous(State(ctx): State<AppContext>) -> ApiResult<Json<IndexResponse>> {
    let index = ctx.handle.previous().await.map_err(error_response)?;
    Ok(Json(IndexResponse { index }))
}

/// POST /playback/jump/:index
pub async fn jump(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> ApiResult<Json<StatusResponse>> {
    ctx.handle.jump_to(index).await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "playing".to_string(),
    }))
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<Json<StatusResponse>> {
    if !req.position_seconds.is_finite() || req.position_seconds < 0.0 {
        return Err(bad_request("position_seconds must be a non-negative number"));
    }
    let position = Duration::from_secs_f64(req.position_seconds);
    ctx.handle.seek(position).await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

// ============================================================================
// Volume
// ============================================================================

/// GET /volume
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: ctx.state.volume().await,
    })
}

/// POST /volume
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<Json<VolumeResponse>> {
    if !req.volume.is_finite() {
        return Err(bad_request("volume must be a number between 0.0 and 1.0"));
    }
    let volume = ctx
        .handle
        .set_volume(req.volume)
        .await
        .map_err(error_response)?;
    Ok(Json(VolumeResponse { volume }))
}

// ============================================================================
// Playlist management
// ============================================================================

/// GET /playback/playlist
pub async fn get_playlist(State(ctx): State<AppContext>) -> ApiResult<Json<PlaylistResponse>> {
    let tracks = ctx.handle.playlist().await.map_err(error_response)?;
    Ok(Json(PlaylistResponse {
        count: tracks.len(),
        tracks,
    }))
}

/// POST /playback/playlist - replace the playlist
pub async fn replace_playlist(
    State(ctx): State<AppContext>,
    Json(req): Json<ReplacePlaylistRequest>,
) -> ApiResult<Json<PlaylistCountResponse>> {
    let tracks = items_to_tracks(req.tracks, ctx.server_url.as_deref())?;
    info!(count = tracks.len(), autoplay = req.autoplay, "playlist replace requested");
    let count = ctx
        .handle
        .replace_playlist(tracks, req.autoplay)
        .await
        .map_err(error_response)?;
    Ok(Json(PlaylistCountResponse { count }))
}

/// POST /playback/enqueue - append tracks
pub async fn enqueue(
    State(ctx): State<AppContext>,
    Json(req): Json<EnqueueRequest>,
) -> ApiResult<Json<PlaylistCountResponse>> {
    let tracks = items_to_tracks(req.tracks, ctx.server_url.as_deref())?;
    let count = ctx.handle.enqueue(tracks).await.map_err(error_response)?;
    Ok(Json(PlaylistCountResponse { count }))
}

/// DELETE /playback/playlist
pub async fn clear_playlist(State(ctx): State<AppContext>) -> ApiResult<Json<StatusResponse>> {
    ctx.handle.clear_playlist().await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "cleared".to_string(),
    }))
}

// ============================================================================
// Remote library operations
// ============================================================================

/// POST /search - kick off a library search; results arrive over SSE
pub async fn search(
    State(ctx): State<AppContext>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<(StatusCode, Json<TaskTicket>)> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let ticket = ctx
        .handle
        .search(req.column, req.query)
        .await
        .map_err(error_response)?;
    Ok(accepted(ticket))
}

/// POST /playlists/refresh - list the server's playlists
pub async fn refresh_playlists(
    State(ctx): State<AppContext>,
) -> ApiResult<(StatusCode, Json<TaskTicket>)> {
    let ticket = ctx.handle.list_playlists().await.map_err(error_response)?;
    Ok(accepted(ticket))
}

/// POST /playlists/:id/load - fetch a playlist into the queue
pub async fn load_playlist(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
    body: Option<Json<LoadPlaylistRequest>>,
) -> ApiResult<(StatusCode, Json<TaskTicket>)> {
    let autoplay = body.map(|Json(req)| req.autoplay).unwrap_or(false);
    let ticket = ctx
        .handle
        .load_playlist(id, autoplay)
        .await
        .map_err(error_response)?;
    Ok(accepted(ticket))
}

/// POST /library/scan - ask the server to rescan its library
pub async fn scan_library(
    State(ctx): State<AppContext>,
    body: Option<Json<ScanRequest>>,
) -> ApiResult<(StatusCode, Json<TaskTicket>)> {
    let folder = body.and_then(|Json(req)| req.folder_path);
    let ticket = ctx
        .handle
        .scan_library(folder)
        .await
        .map_err(error_response)?;
    Ok(accepted(ticket))
}

/// POST /server/check - probe the remote server now
pub async fn check_server(
    State(ctx): State<AppContext>,
) -> ApiResult<(StatusCode, Json<TaskTicket>)> {
    let ticket = ctx.handle.check_server().await.map_err(error_response)?;
    Ok(accepted(ticket))
}
