//! Playback position and output level instrumentation
//!
//! Wraps a decoded audio source so the engine can read the playing position
//! (frame counting) and a short-window RMS level in dBFS without touching
//! the audio thread. The wrapper publishes into a shared `LevelProbe`; all
//! reads are lock-free atomics.

use rodio::source::SeekError;
use rodio::Source;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Level reported for digital silence (RMS of exactly zero)
pub const SILENCE_FLOOR_DB: f32 = -120.0;

/// RMS window length as a fraction of a second (10 = 100 ms windows)
const WINDOWS_PER_SECOND: u32 = 10;

/// Shared playback instrumentation for one loaded source
///
/// Written by the audio thread via `MeterSource`, read by the decision loop.
/// Level is stored as centi-dB in an `AtomicI32` so readers never block.
#[derive(Debug)]
pub struct LevelProbe {
    sample_rate: u32,
    channels: u16,
    frames_played: AtomicU64,
    level_centi_db: AtomicI32,
    finished: AtomicBool,
}

impl LevelProbe {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames_played: AtomicU64::new(0),
            level_centi_db: AtomicI32::new((SILENCE_FLOOR_DB * 100.0) as i32),
            finished: AtomicBool::new(false),
        }
    }

    /// Samples per channel in one RMS window
    pub fn window_frames(&self) -> u32 {
        (self.sample_rate / WINDOWS_PER_SECOND).max(1)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Current playback position derived from frames consumed
    pub fn position(&self) -> Duration {
        let frames = self.frames_played.load(Ordering::Relaxed);
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Most recent window's RMS level in dBFS
    pub fn level_db(&self) -> f32 {
        self.level_centi_db.load(Ordering::Relaxed) as f32 / 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    pub(crate) fn advance_frames(&self, n: u64) {
        self.frames_played.fetch_add(n, Ordering::Relaxed);
    }

    /// Re-base the frame counter after a seek
    pub(crate) fn set_position(&self, position: Duration) {
        let frames = (position.as_secs_f64() * self.sample_rate as f64) as u64;
        self.frames_played.store(frames, Ordering::Relaxed);
    }

    /// Publish a finished RMS window
    pub(crate) fn record_window(&self, rms: f32) {
        let db = if rms <= 0.0 {
            SILENCE_FLOOR_DB
        } else {
            (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
        };
        self.level_centi_db
            .store((db * 100.0) as i32, Ordering::Relaxed);
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// Source adapter that feeds a `LevelProbe` while passing samples through
///
/// Sits between the decoder and the sink. Counts whole frames for position
/// and accumulates squared samples into fixed windows for the RMS level.
pub struct MeterSource<S>
where
    S: Source<Item = f32>,
{
    inner: S,
    probe: Arc<LevelProbe>,
    channels: u16,
    window_frames: u32,
    sample_in_frame: u16,
    frames_in_window: u32,
    samples_in_window: u64,
    sum_squares: f64,
}

impl<S> MeterSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, probe: Arc<LevelProbe>) -> Self {
        let channels = probe.channels();
        let window_frames = probe.window_frames();
        Self {
            inner,
            probe,
            channels,
            window_frames,
            sample_in_frame: 0,
            frames_in_window: 0,
            samples_in_window: 0,
            sum_squares: 0.0,
        }
    }

    fn reset_window(&mut self) {
        self.frames_in_window = 0;
        self.samples_in_window = 0;
        self.sum_squares = 0.0;
    }
}

impl<S> Iterator for MeterSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.inner.next() {
            Some(sample) => {
                self.sum_squares += (sample as f64) * (sample as f64);
                self.samples_in_window += 1;
                self.sample_in_frame += 1;
                if self.sample_in_frame >= self.channels {
                    self.sample_in_frame = 0;
                    self.probe.advance_frames(1);
                    self.frames_in_window += 1;
                    if self.frames_in_window >= self.window_frames {
                        let mean = self.sum_squares / self.samples_in_window as f64;
                        self.probe.record_window(mean.sqrt() as f32);
                        self.reset_window();
                    }
                }
                Some(sample)
            }
            None => {
                self.probe.mark_finished();
                None
            }
        }
    }
}

impl<S> Source for MeterSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.inner.try_seek(pos)?;
        self.probe.set_position(pos);
        // Discard the partial window; the next full window restores level
        self.reset_window();
        self.sample_in_frame = 0;
        Ok(())
    }
}
