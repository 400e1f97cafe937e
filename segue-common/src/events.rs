//! Event types for the Segue event system
//!
//! Provides the shared event definitions and the EventBus the daemon
//! broadcasts on. Events are serializable for SSE transmission; all
//! consumers match on the central enum for exhaustive handling.

use crate::curves::MixCurve;
use crate::track::{PlaylistSummary, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Transport state of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// What the engine is doing right now, for UI status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineActivity {
    /// Normal playback, no transition or silence episode in progress
    Inactive,
    /// The gap detector is accumulating continuous silence
    SilenceBuilding,
    /// A gap skip has fired for the current silence episode
    SkipTriggered,
    /// A channel transition is armed or fading
    TransitionActive,
}

/// Segue event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every payload carries its own timestamp so late SSE consumers can order
/// what they receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed (Playing / Paused / Stopped)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track started playing on the active channel
    ///
    /// Fires both for fresh starts and for transition commits.
    TrackStarted {
        track_id: Uuid,
        /// Playlist position of the track
        index: usize,
        title: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track finished or was skipped away from
    TrackFinished {
        track_id: Uuid,
        index: usize,
        /// False when the track was cut short by a jump or skip
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A crossfade armed: the next track is audible on the standby channel
    TransitionStarted {
        from_track: Uuid,
        to_track: Uuid,
        curve: MixCurve,
        window_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The crossfade committed; the standby channel is now the active one
    TransitionCommitted {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An in-flight transition was cancelled (jump, stop, or failure)
    TransitionCancelled {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine activity changed (silence building, skip fired, transition)
    ActivityChanged {
        activity: EngineActivity,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The gap detector skipped over silence
    GapSkipped {
        track_id: Uuid,
        from_ms: u64,
        to_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic playback progress
    ///
    /// Emitted once per second during playback; not persisted anywhere.
    PositionUpdate {
        track_id: Uuid,
        position_ms: u64,
        duration_ms: Option<u64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The playlist contents were replaced or extended
    PlaylistChanged {
        track_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Master volume changed
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A library search finished; results ride along for SSE consumers
    SearchCompleted {
        column: String,
        query: String,
        results: Vec<Track>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The remote server listed its playlists
    PlaylistsListed {
        playlists: Vec<PlaylistSummary>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Metadata arrived for a track
    MetadataResolved {
        track_id: Uuid,
        title: Option<String>,
        artist: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A remote library scan finished
    LibraryScanCompleted {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Remote server reachability changed
    ServerStatusChanged {
        reachable: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A background task failed (timeout, remote error, unavailable source)
    TaskFailed {
        slot: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Event bus for broadcasting player events
///
/// Wraps a tokio broadcast channel. Subscribers that fall behind lose the
/// oldest events; the sender never blocks on slow consumers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it. Zero subscribers
    /// is normal (nothing connected yet) and not an error.
    pub fn emit(&self, event: PlayerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> PlayerEvent {
        PlayerEvent::VolumeChanged {
            volume: 0.5,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_receives_emitted_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit(sample_event()), 1);

        let event = rx.recv().await.unwrap();
        match event {
            PlayerEvent::VolumeChanged { volume, .. } => assert_eq!(volume, 0.5),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let bus = EventBus::new(16);
        assert_eq!(bus.emit(sample_event()), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        assert!(json.contains("\"type\":\"VolumeChanged\""));
    }

    #[test]
    fn test_activity_serializes_kebab_case() {
        let json = serde_json::to_string(&EngineActivity::SilenceBuilding).unwrap();
        assert_eq!(json, "\"silence-building\"");
        let json = serde_json::to_string(&EngineActivity::TransitionActive).unwrap();
        assert_eq!(json, "\"transition-active\"");
    }
}
