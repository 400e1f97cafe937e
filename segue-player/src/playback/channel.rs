//! Dual playback channels
//!
//! The engine owns exactly two channels. One is active (audible at full
//! fade), the other is standby (idle, or ramping in during a transition).
//! A channel's effective sink volume is always `master × fade`; the fade
//! factor belongs to the transition machinery, master to the user.

use crate::audio::MediaSink;
use crate::error::{Error, Result};
use segue_common::Track;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Identifies one of the two playback channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    pub fn other(&self) -> ChannelId {
        match self {
            ChannelId::A => ChannelId::B,
            ChannelId::B => ChannelId::A,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::A => write!(f, "A"),
            ChannelId::B => write!(f, "B"),
        }
    }
}

/// One playback channel: a sink plus its transition fade factor
pub struct PlaybackChannel {
    id: ChannelId,
    sink: Box<dyn MediaSink>,
    fade: f32,
    loaded: Option<Uuid>,
}

impl PlaybackChannel {
    pub fn new(id: ChannelId, sink: Box<dyn MediaSink>) -> Self {
        Self {
            id,
            sink,
            fade: 1.0,
            loaded: None,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Load and start a track on this channel at the given fade factor.
    ///
    /// The track must be start-ready (local, or already spooled); remote
    /// sources that have not been prefetched fail with `SourceUnavailable`.
    pub fn start(&mut self, track: &Track, master: f32, fade: f32) -> Result<()> {
        let path = track.playable_path().ok_or_else(|| {
            Error::SourceUnavailable(format!(
                "{} has no playable source yet",
                track.display_name()
            ))
        })?;
        let fade = fade.clamp(0.0, 1.0);
        self.sink.load(path, master * fade)?;
        self.fade = fade;
        self.loaded = Some(track.id);
        debug!("channel {} started {} (fade {:.2})", self.id, track.display_name(), fade);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.loaded.is_some() {
            debug!("channel {} stopped", self.id);
        }
        self.sink.stop();
        self.loaded = None;
        self.fade = 1.0;
    }

    pub fn pause(&mut self) {
        self.sink.pause();
    }

    pub fn resume(&mut self) {
        self.sink.play();
    }

    /// Set the transition fade factor, reapplying the effective volume
    pub fn set_fade(&mut self, fade: f32, master: f32) {
        self.fade = fade.clamp(0.0, 1.0);
        self.sink.set_volume(master * self.fade);
    }

    pub fn fade(&self) -> f32 {
        self.fade
    }

    /// Reapply effective volume after a master volume change
    pub fn apply_master(&mut self, master: f32) {
        self.sink.set_volume(master * self.fade);
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        self.sink.seek(position)
    }

    pub fn position(&self) -> Duration {
        self.sink.position()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.sink.duration()
    }

    pub fn level_db(&self) -> f32 {
        self.sink.level_db()
    }

    pub fn is_finished(&self) -> bool {
        self.sink.is_finished()
    }

    /// Id of the track loaded on this channel, if any
    pub fn loaded_track(&self) -> Option<Uuid> {
        self.loaded
    }
}

/// The two channels plus which one is currently active
pub struct ChannelPair {
    a: PlaybackChannel,
    b: PlaybackChannel,
    active: ChannelId,
}

impl ChannelPair {
    pub fn new(sink_a: Box<dyn MediaSink>, sink_b: Box<dyn MediaSink>) -> Self {
        Self {
            a: PlaybackChannel::new(ChannelId::A, sink_a),
            b: PlaybackChannel::new(ChannelId::B, sink_b),
            active: ChannelId::A,
        }
    }

    pub fn active_id(&self) -> ChannelId {
        self.active
    }

    pub fn active(&self) -> &PlaybackChannel {
        self.get(self.active)
    }

    pub fn active_mut(&mut self) -> &mut PlaybackChannel {
        self.get_mut(self.active)
    }

    pub fn standby(&self) -> &PlaybackChannel {
        self.get(self.active.other())
    }

    pub fn standby_mut(&mut self) -> &mut PlaybackChannel {
        self.get_mut(self.active.other())
    }

    pub fn get(&self, id: ChannelId) -> &PlaybackChannel {
        match id {
            ChannelId::A => &self.a,
            ChannelId::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, id: ChannelId) -> &mut PlaybackChannel {
        match id {
            ChannelId::A => &mut self.a,
            ChannelId::B => &mut self.b,
        }
    }

    /// Make the standby channel the active one
    pub fn swap_active(&mut self) {
        self.active = self.active.other();
        debug!("active channel is now {}", self.active);
    }

    pub fn stop_both(&mut self) {
        self.a.stop();
        self.b.stop();
    }

    pub fn pause_both(&mut self) {
        self.a.pause();
        self.b.pause();
    }

    pub fn resume_both(&mut self) {
        self.a.resume();
        self.b.resume();
    }

    pub fn apply_master(&mut self, master: f32) {
        self.a.apply_master(master);
        self.b.apply_master(master);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Minimal sink for channel-level tests; integration tests use the
    /// richer scripted sink in tests/helpers.
    #[derive(Default)]
    struct FakeSink {
        volume: f32,
        loaded: Option<std::path::PathBuf>,
    }

    impl MediaSink for FakeSink {
        fn load(&mut self, path: &Path, volume: f32) -> Result<()> {
            self.loaded = Some(path.to_path_buf());
            self.volume = volume;
            Ok(())
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn stop(&mut self) {
            self.loaded = None;
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn volume(&self) -> f32 {
            self.volume
        }
        fn seek(&mut self, _position: Duration) -> Result<()> {
            Ok(())
        }
        fn position(&self) -> Duration {
            Duration::ZERO
        }
        fn duration(&self) -> Option<Duration> {
            None
        }
        fn level_db(&self) -> f32 {
            0.0
        }
        fn is_finished(&self) -> bool {
            false
        }
    }

    fn pair() -> ChannelPair {
        ChannelPair::new(Box::<FakeSink>::default(), Box::<FakeSink>::default())
    }

    #[test]
    fn test_initial_active_is_a() {
        let channels = pair();
        assert_eq!(channels.active_id(), ChannelId::A);
        assert_eq!(channels.standby().id(), ChannelId::B);
    }

    #[test]
    fn test_swap_active() {
        let mut channels = pair();
        channels.swap_active();
        assert_eq!(channels.active_id(), ChannelId::B);
        assert_eq!(channels.standby().id(), ChannelId::A);
        channels.swap_active();
        assert_eq!(channels.active_id(), ChannelId::A);
    }

    #[test]
    fn test_start_requires_playable_source() {
        let mut channels = pair();
        let track = Track::remote("http://srv:5000", "a.mp3");
        let err = channels.active_mut().start(&track, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
        assert!(channels.active().loaded_track().is_none());
    }

    #[test]
    fn test_effective_volume_is_master_times_fade() {
        let mut channels = pair();
        let track = Track::local("/music/x.mp3");
        channels.active_mut().start(&track, 0.8, 1.0).unwrap();

        channels.active_mut().set_fade(0.5, 0.8);
        assert!((channels.active().fade() - 0.5).abs() < 1e-6);

        // set_fade applied master * fade to the sink
        let sink_volume = channels.active().sink.volume();
        assert!((sink_volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_stop_resets_fade_and_loaded() {
        let mut channels = pair();
        let track = Track::local("/music/x.mp3");
        channels.active_mut().start(&track, 1.0, 0.0).unwrap();
        assert_eq!(channels.active().loaded_track(), Some(track.id));
        assert_eq!(channels.active().fade(), 0.0);

        channels.active_mut().stop();
        assert!(channels.active().loaded_track().is_none());
        assert_eq!(channels.active().fade(), 1.0);
    }

    #[test]
    fn test_channel_id_other() {
        assert_eq!(ChannelId::A.other(), ChannelId::B);
        assert_eq!(ChannelId::B.other(), ChannelId::A);
        assert_eq!(ChannelId::A.to_string(), "A");
    }
}
