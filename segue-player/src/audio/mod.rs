//! Platform media playback seam
//!
//! The engine talks to the platform's playback primitive through the
//! `MediaSink` trait. Production uses rodio behind `RodioSink`; tests use a
//! scripted sink. The meter module supplies the position and output-level
//! instrumentation the gap detector and scheduler read every tick.

pub mod meter;
pub mod sink;

pub use meter::{LevelProbe, MeterSource, SILENCE_FLOOR_DB};
pub use sink::{MediaSink, RodioSink};
