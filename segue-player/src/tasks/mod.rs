//! Background task execution
//!
//! Long-running work (remote calls, library operations, prefetch) runs off
//! the decision loop in named slots with supersede semantics. Results come
//! back on a single ordered delivery channel.

pub mod dispatcher;

pub use dispatcher::{TaskDelivery, TaskDispatcher, TaskOutcome, TaskTicket};

use crate::remote::types::{ScanSummary, SearchHit};
use segue_common::track::PlaylistSummary;
use segue_common::{Track, TrackMetadata};
use std::path::PathBuf;
use uuid::Uuid;

/// Well-known slot names used by the controller
pub mod slots {
    /// Library search; one outstanding query at a time
    pub const SEARCH: &str = "search";
    /// Listing the server's playlists
    pub const PLAYLISTS: &str = "playlists";
    /// Resolving one playlist into tracks
    pub const PLAYLIST_TRACKS: &str = "playlist-tracks";
    /// Metadata lookup for the current track
    pub const METADATA: &str = "metadata";
    /// Spooling the upcoming remote track to local disk
    pub const PREFETCH: &str = "prefetch";
    /// Remote library rescan
    pub const SCAN_LIBRARY: &str = "scan-library";
    /// Server liveness probe
    pub const SERVER_STATUS: &str = "server-status";
}

/// Payload of a completed background task
#[derive(Debug, Clone)]
pub enum TaskPayload {
    Search {
        column: String,
        query: String,
        hits: Vec<SearchHit>,
    },
    Playlists(Vec<PlaylistSummary>),
    PlaylistTracks {
        playlist_id: i64,
        name: String,
        tracks: Vec<Track>,
    },
    Metadata {
        track_id: Uuid,
        metadata: TrackMetadata,
    },
    Prefetched {
        track_id: Uuid,
        path: PathBuf,
    },
    Scan(ScanSummary),
    ServerStatus {
        reachable: bool,
    },
}
