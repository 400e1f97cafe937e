//! Playback orchestration: playlist, channels, transitions, silence skip

pub mod channel;
pub mod controller;
pub mod crossfade;
pub mod gap;
pub mod playlist;

pub use channel::{ChannelId, ChannelPair, PlaybackChannel};
pub use controller::{ControllerCommand, PlaybackController, PlayerHandle};
pub use crossfade::{CrossfadeScheduler, TickEffect, TransitionState};
pub use gap::{GapAction, GapDetector, GapStatus};
pub use playlist::PlaylistState;
