//! Test helper modules for playback engine integration tests
//!
//! Provides reusable test infrastructure:
//! - MediaLibrary / ScriptedSink: clock-driven fake media sinks
//! - TestPlayer: a spawned controller plus handles for assertions
//! - run_for / drain_events: paused-clock driving and event collection

pub mod player;

pub use player::{
    drain_events, run_for, spawn_player, MediaLibrary, ScriptedMedia, ScriptedSink, SinkHandle,
    TestPlayer,
};
