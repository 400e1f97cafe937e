//! Server-Sent Events stream
//!
//! Streams player events to connected clients. Each SSE message carries
//! the event name in the `event:` field and the JSON payload in `data:`.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use segue_common::events::PlayerEvent;

use crate::api::AppContext;

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("new SSE client connected");

    let rx = ctx.state.subscribe_events();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default()
                    .event(event_type_str(&event))
                    .data(json))),
                Err(e) => {
                    warn!("failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged receiver; the client just misses those events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// SSE event name for a player event
fn event_type_str(event: &PlayerEvent) -> &'static str {
    match event {
        PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
        PlayerEvent::TrackStarted { .. } => "TrackStarted",
        PlayerEvent::TrackFinished { .. } => "TrackFinished",
        PlayerEvent::TransitionStarted { .. } => "TransitionStarted",
        PlayerEvent::TransitionCommitted { .. } => "TransitionCommitted",
        PlayerEvent::TransitionCancelled { .. } => "TransitionCancelled",
        PlayerEvent::ActivityChanged { .. } => "ActivityChanged",
        PlayerEvent::GapSkipped { .. } => "GapSkipped",
        PlayerEvent::PositionUpdate { .. } => "PositionUpdate",
        PlayerEvent::PlaylistChanged { .. } => "PlaylistChanged",
        PlayerEvent::VolumeChanged { .. } => "VolumeChanged",
        PlayerEvent::SearchCompleted { .. } => "SearchCompleted",
        PlayerEvent::PlaylistsListed { .. } => "PlaylistsListed",
        PlayerEvent::MetadataResolved { .. } => "MetadataResolved",
        PlayerEvent::LibraryScanCompleted { .. } => "LibraryScanCompleted",
        PlayerEvent::ServerStatusChanged { .. } => "ServerStatusChanged",
        PlayerEvent::TaskFailed { .. } => "TaskFailed",
    }
}
