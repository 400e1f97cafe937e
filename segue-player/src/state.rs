//! Shared playback state
//!
//! Thread-safe snapshot of what the engine is doing, readable from the
//! HTTP layer while the decision loop remains the only writer.

use segue_common::events::{EngineActivity, PlaybackState, PlayerEvent};
use segue_common::EventBus;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::playback::{ChannelId, GapStatus, TransitionState};

/// Summary of the track on the active channel
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    /// Track ID
    pub track_id: Uuid,
    /// Position in the playlist
    pub index: usize,
    /// Display title (falls back to file name)
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Current position in milliseconds
    pub position_ms: u64,
    /// Total duration in milliseconds, if known
    pub duration_ms: Option<u64>,
}

/// Transition and silence-skip internals, published for status queries
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub activity: EngineActivity,
    pub transition: TransitionState,
    pub gap: GapStatus,
    pub active_channel: ChannelId,
    pub playlist_len: usize,
    /// Background task slots currently occupied
    pub busy_slots: Vec<String>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            activity: EngineActivity::Inactive,
            transition: TransitionState::Idle,
            gap: GapStatus::Inactive,
            active_channel: ChannelId::A,
            playlist_len: 0,
            busy_slots: Vec::new(),
        }
    }
}

/// Full status document returned by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub volume: f32,
    pub now_playing: Option<NowPlaying>,
    #[serde(flatten)]
    pub engine: EngineSnapshot,
    pub server_reachable: bool,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes. The
/// playback controller is the sole writer.
pub struct SharedState {
    /// Current playback state
    playback_state: RwLock<PlaybackState>,

    /// Track on the active channel (None when stopped or playlist empty)
    now_playing: RwLock<Option<NowPlaying>>,

    /// Transition, gap and dispatcher internals
    engine: RwLock<EngineSnapshot>,

    /// Master volume (0.0-1.0)
    volume: RwLock<f32>,

    /// Whether the remote library server answered the last probe
    server_reachable: RwLock<bool>,

    /// Event broadcaster for SSE listeners
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        Self {
            playback_state: RwLock::new(PlaybackState::Stopped),
            now_playing: RwLock::new(None),
            engine: RwLock::new(EngineSnapshot::default()),
            volume: RwLock::new(1.0),
            server_reachable: RwLock::new(false),
            events: EventBus::default(),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: PlayerEvent) {
        self.events.emit(event);
    }

    /// Subscribe to the event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub async fn playback_state(&self) -> PlaybackState {
        *self.playback_state.read().await
    }

    pub async fn set_playback_state(&self, state: PlaybackState) {
        *self.playback_state.write().await = state;
    }

    pub async fn now_playing(&self) -> Option<NowPlaying> {
        self.now_playing.read().await.clone()
    }

    pub async fn set_now_playing(&self, now: Option<NowPlaying>) {
        *self.now_playing.write().await = now;
    }

    pub async fn engine_snapshot(&self) -> EngineSnapshot {
        self.engine.read().await.clone()
    }

    pub async fn set_engine_snapshot(&self, snapshot: EngineSnapshot) {
        *self.engine.write().await = snapshot;
    }

    pub async fn volume(&self) -> f32 {
        *self.volume.read().await
    }

    pub async fn set_volume(&self, volume: f32) {
        *self.volume.write().await = volume.clamp(0.0, 1.0);
    }

    pub async fn server_reachable(&self) -> bool {
        *self.server_reachable.read().await
    }

    pub async fn set_server_reachable(&self, reachable: bool) {
        *self.server_reachable.write().await = reachable;
    }

    /// Compose the full status document from the individual fields
    pub async fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.playback_state().await,
            volume: self.volume().await,
            now_playing: self.now_playing().await,
            engine: self.engine_snapshot().await,
            server_reachable: self.server_reachable().await,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_stopped_and_silent() {
        let state = SharedState::new();
        assert_eq!(state.playback_state().await, PlaybackState::Stopped);
        assert!(state.now_playing().await.is_none());
        assert!(!state.server_reachable().await);
        assert_eq!(state.volume().await, 1.0);
    }

    #[tokio::test]
    async fn test_volume_clamped_on_write() {
        let state = SharedState::new();
        state.set_volume(1.8).await;
        assert_eq!(state.volume().await, 1.0);
        state.set_volume(-0.3).await;
        assert_eq!(state.volume().await, 0.0);
    }

    #[tokio::test]
    async fn test_status_composes_fields() {
        let state = SharedState::new();
        state.set_playback_state(PlaybackState::Playing).await;
        state.set_server_reachable(true).await;
        let status = state.status().await;
        assert_eq!(status.state, PlaybackState::Playing);
        assert!(status.server_reachable);
        assert_eq!(status.engine.playlist_len, 0);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_silent() {
        let state = SharedState::new();
        state.broadcast_event(PlayerEvent::VolumeChanged {
            volume: 0.5,
            timestamp: chrono::Utc::now(),
        });
    }
}
