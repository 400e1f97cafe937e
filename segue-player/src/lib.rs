//! # Segue Player Library (segue-player)
//!
//! Playback orchestration daemon with dual-channel crossfading and
//! silence skipping.
//!
//! **Purpose:** Play local and remote tracks through two alternating
//! audio channels, crossfade between consecutive playlist entries,
//! skip over long stretches of silence inside tracks, and expose an
//! HTTP/SSE control interface.
//!
//! **Architecture:** A single decision loop owns all playback state;
//! HTTP handlers and background tasks talk to it over channels.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod remote;
pub mod state;
pub mod tasks;

pub use error::{Error, Result, TaskError};
pub use playback::{PlaybackController, PlayerHandle};
pub use state::SharedState;
