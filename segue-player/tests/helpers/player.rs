//! Scripted playback rig for integration tests
//!
//! `MediaLibrary` registers fake media files by path; `ScriptedSink` plays
//! them against the tokio clock, so tests under
//! `#[tokio::test(start_paused = true)]` can drive minutes of playback in
//! milliseconds. `spawn_player` wires a full controller onto two scripted
//! sinks with no remote server configured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use segue_common::{EngineParams, PlayerEvent, Track};
use segue_player::audio::{MediaSink, SILENCE_FLOOR_DB};
use segue_player::playback::ChannelPair;
use segue_player::state::SharedState;
use segue_player::{Error, PlaybackController, PlayerHandle, Result};

/// Properties of one registered fake media file
#[derive(Debug, Clone)]
pub struct ScriptedMedia {
    pub duration: Duration,
    /// (start position, dBFS) pairs; the level at a position is the last
    /// entry at or before it
    pub levels: Vec<(Duration, f32)>,
}

impl ScriptedMedia {
    fn level_at(&self, position: Duration) -> f32 {
        self.levels
            .iter()
            .rev()
            .find(|(start, _)| *start <= position)
            .map(|(_, level)| *level)
            .unwrap_or(-20.0)
    }
}

/// Registry of fake media files shared by both scripted sinks
#[derive(Clone, Default)]
pub struct MediaLibrary {
    entries: Arc<Mutex<HashMap<PathBuf, ScriptedMedia>>>,
}

impl MediaLibrary {
    /// Register a local file playing at a steady -20 dBFS
    pub fn add(&self, path: &str, duration_secs: f64) -> Track {
        self.add_with_levels(path, duration_secs, &[(0.0, -20.0)])
    }

    /// Register a local file whose output level changes at the given
    /// positions (seconds, dBFS)
    pub fn add_with_levels(&self, path: &str, duration_secs: f64, levels: &[(f64, f32)]) -> Track {
        let media = ScriptedMedia {
            duration: Duration::from_secs_f64(duration_secs),
            levels: levels
                .iter()
                .map(|(start, level)| (Duration::from_secs_f64(*start), *level))
                .collect(),
        };
        self.entries
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), media);
        Track::local(path)
    }

    /// Build a sink playing from this library, plus its assertion handle
    pub fn sink(&self) -> (ScriptedSink, SinkHandle) {
        let state = Arc::new(Mutex::new(SinkState::default()));
        (
            ScriptedSink {
                library: self.clone(),
                state: Arc::clone(&state),
            },
            SinkHandle { state },
        )
    }
}

#[derive(Default)]
struct SinkState {
    media: Option<ScriptedMedia>,
    path: Option<PathBuf>,
    volume: f32,
    /// Position when the clock below last (re)started
    base: Duration,
    /// Tokio clock instant playback resumed; None while paused or stopped
    started: Option<Instant>,
}

impl SinkState {
    fn position(&self) -> Duration {
        let raw = self.base + self.started.map(|s| s.elapsed()).unwrap_or_default();
        match &self.media {
            Some(media) => raw.min(media.duration),
            None => Duration::ZERO,
        }
    }

    fn finished(&self) -> bool {
        match &self.media {
            Some(media) => self.position() >= media.duration,
            None => true,
        }
    }
}

/// `MediaSink` that advances with the (pausable) tokio clock
pub struct ScriptedSink {
    library: MediaLibrary,
    state: Arc<Mutex<SinkState>>,
}

/// Cloneable view of one scripted sink for test assertions
#[derive(Clone)]
pub struct SinkHandle {
    state: Arc<Mutex<SinkState>>,
}

impl SinkHandle {
    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().path.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().unwrap().media.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    pub fn position(&self) -> Duration {
        self.state.lock().unwrap().position()
    }
}

impl MediaSink for ScriptedSink {
    fn load(&mut self, path: &Path, volume: f32) -> Result<()> {
        let media = self
            .library
            .entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                Error::SourceUnavailable(format!("no scripted media at {}", path.display()))
            })?;
        let mut state = self.state.lock().unwrap();
        state.media = Some(media);
        state.path = Some(path.to_path_buf());
        state.volume = volume;
        state.base = Duration::ZERO;
        state.started = Some(Instant::now());
        Ok(())
    }

    fn play(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.media.is_some() && state.started.is_none() {
            state.started = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.base = state.position();
        state.started = None;
    }

    fn stop(&mut self) {
        *self.state.lock().unwrap() = SinkState::default();
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.media.is_none() {
            return Err(Error::SourceUnavailable("nothing loaded".to_string()));
        }
        let playing = state.started.is_some();
        state.base = position;
        state.started = playing.then(Instant::now);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position()
    }

    fn duration(&self) -> Option<Duration> {
        self.state
            .lock()
            .unwrap()
            .media
            .as_ref()
            .map(|media| media.duration)
    }

    fn level_db(&self) -> f32 {
        let state = self.state.lock().unwrap();
        match &state.media {
            Some(media) if !state.finished() => media.level_at(state.position()),
            _ => SILENCE_FLOOR_DB,
        }
    }

    fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished()
    }
}

/// A spawned controller plus everything a test needs to poke at it
pub struct TestPlayer {
    pub handle: PlayerHandle,
    pub shared: Arc<SharedState>,
    pub library: MediaLibrary,
    pub a: SinkHandle,
    pub b: SinkHandle,
    pub events: broadcast::Receiver<PlayerEvent>,
}

/// Spawn a full controller on scripted sinks with no remote server.
///
/// The event receiver is subscribed before the controller starts, so
/// tests see every event from the first command on.
pub fn spawn_player(params: EngineParams) -> TestPlayer {
    let library = MediaLibrary::default();
    let (sink_a, a) = library.sink();
    let (sink_b, b) = library.sink();
    let channels = ChannelPair::new(Box::new(sink_a), Box::new(sink_b));
    let shared = Arc::new(SharedState::new());
    let events = shared.subscribe_events();
    let (controller, handle) = PlaybackController::new(
        params,
        channels,
        None,
        std::env::temp_dir().join("segue-test-spool"),
        Arc::clone(&shared),
    );
    tokio::spawn(controller.run());
    TestPlayer {
        handle,
        shared,
        library,
        a,
        b,
        events,
    }
}

/// Advance the paused tokio clock in engine-tick increments, yielding
/// after each step so the controller observes every tick at the matching
/// sink position.
pub async fn run_for(duration: Duration) {
    let step = Duration::from_millis(100);
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        let slice = step.min(remaining);
        tokio::time::advance(slice).await;
        tokio::task::yield_now().await;
        remaining -= slice;
    }
}

/// Pull everything currently queued on the event receiver
pub fn drain_events(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                panic!("event receiver lagged by {n}; drain more often");
            }
            Err(_) => break,
        }
    }
    events
}
