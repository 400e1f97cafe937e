//! Media sink trait and the rodio-backed production implementation
//!
//! `MediaSink` is the seam between the engine and the platform playback
//! primitive: load, transport, volume, seek, position, duration, and the
//! output level the gap detector samples. The engine only ever opens local
//! paths; remote sources are spooled to disk by the prefetch task first.

use crate::audio::meter::{LevelProbe, MeterSource, SILENCE_FLOOR_DB};
use crate::error::{Error, Result};
use rodio::{OutputStreamHandle, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Platform media playback primitive
///
/// One sink per playback channel. Implementations must be cheap to poll:
/// `position`, `level_db` and `is_finished` are read every engine tick.
pub trait MediaSink: Send {
    /// Load an audio file and start playing it at the given volume.
    ///
    /// Replaces whatever the sink was playing before. Fails with
    /// `SourceUnavailable` when the file cannot be opened or decoded.
    fn load(&mut self, path: &Path, volume: f32) -> Result<()>;

    fn play(&mut self);
    fn pause(&mut self);

    /// Stop playback and discard the loaded source
    fn stop(&mut self);

    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;

    /// Seek within the loaded source
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Playback position within the loaded source
    fn position(&self) -> Duration;

    /// Total duration of the loaded source, when the container declares one
    fn duration(&self) -> Option<Duration>;

    /// Most recent short-window RMS output level in dBFS
    fn level_db(&self) -> f32;

    /// Whether the loaded source has played to its end
    fn is_finished(&self) -> bool;
}

/// `MediaSink` backed by a rodio output stream
///
/// The `rodio::OutputStream` itself lives on the main thread for process
/// lifetime; this type only holds the cloneable handle. Each `load` builds a
/// fresh decoder, meter tap, and `rodio::Sink`.
pub struct RodioSink {
    handle: OutputStreamHandle,
    sink: Option<rodio::Sink>,
    probe: Option<Arc<LevelProbe>>,
    declared_duration: Option<Duration>,
    volume: f32,
}

impl RodioSink {
    pub fn new(handle: OutputStreamHandle) -> Self {
        Self {
            handle,
            sink: None,
            probe: None,
            declared_duration: None,
            volume: 1.0,
        }
    }
}

impl MediaSink for RodioSink {
    fn load(&mut self, path: &Path, volume: f32) -> Result<()> {
        self.stop();

        let file = File::open(path).map_err(|e| {
            Error::SourceUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        let decoder = rodio::Decoder::new(BufReader::new(file)).map_err(|e| {
            Error::SourceUnavailable(format!("cannot decode {}: {}", path.display(), e))
        })?;

        self.declared_duration = decoder.total_duration();

        let converted = decoder.convert_samples::<f32>();
        let probe = Arc::new(LevelProbe::new(converted.sample_rate(), converted.channels()));
        let metered = MeterSource::new(converted, Arc::clone(&probe));

        let sink = rodio::Sink::try_new(&self.handle)
            .map_err(|e| Error::Internal(format!("audio output: {}", e)))?;
        sink.set_volume(volume);
        sink.append(metered);
        sink.play();

        debug!(
            "loaded {} (duration {:?}) at volume {:.2}",
            path.display(),
            self.declared_duration,
            volume
        );

        self.volume = volume;
        self.probe = Some(probe);
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.probe = None;
        self.declared_duration = None;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        match &self.sink {
            Some(sink) => sink.try_seek(position).map_err(|e| {
                warn!("seek to {:?} failed: {}", position, e);
                Error::Internal(format!("seek: {}", e))
            }),
            None => Err(Error::SourceUnavailable("nothing loaded".to_string())),
        }
    }

    fn position(&self) -> Duration {
        self.probe
            .as_ref()
            .map(|p| p.position())
            .unwrap_or(Duration::ZERO)
    }

    fn duration(&self) -> Option<Duration> {
        self.declared_duration
    }

    fn level_db(&self) -> f32 {
        self.probe
            .as_ref()
            .map(|p| p.level_db())
            .unwrap_or(SILENCE_FLOOR_DB)
    }

    fn is_finished(&self) -> bool {
        match &self.sink {
            Some(sink) => sink.empty(),
            None => true,
        }
    }
}
