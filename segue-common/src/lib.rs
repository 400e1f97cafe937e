//! # Segue Common Library
//!
//! Shared code for the Segue playback daemon and its tooling:
//! - Track model (unified local/remote source classification)
//! - Event types (PlayerEvent enum) and EventBus
//! - Engine tuning parameters with range clamping
//! - Mix curve definitions and calculations
//! - Common error types

pub mod curves;
pub mod error;
pub mod events;
pub mod params;
pub mod track;

pub use curves::MixCurve;
pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, PlayerEvent};
pub use params::EngineParams;
pub use track::{Track, TrackMetadata, TrackSource};
