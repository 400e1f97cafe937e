//! Silence gap detector
//!
//! Samples the active channel's output level on the engine tick cadence and
//! accumulates continuous time below the silence threshold. Once the
//! accumulated silence reaches the configured minimum, it requests a single
//! bounded skip forward; it will not fire again until a loud sample ends the
//! episode or a reset begins a new one.
//!
//! The detector is never sampled while a transition is in flight; the
//! controller gates that, since an intentional fade-out reads as silence.

use crate::playback::channel::ChannelId;
use segue_common::EngineParams;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Requested remedy for a detected gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapAction {
    /// Seek forward by this much (capped near end of track by the caller)
    SkipAhead(Duration),
}

/// Externally visible state of one channel's silence episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GapStatus {
    /// No silence accumulating
    Inactive,
    /// Below threshold, but not yet long enough to fire
    Building { silent_for_ms: u64 },
    /// The skip fired for the current episode
    Triggered,
}

#[derive(Debug, Default, Clone, Copy)]
struct GapLane {
    silent_for: Duration,
    armed: bool,
}

/// Per-channel silence watchdog
pub struct GapDetector {
    threshold_db: f32,
    min_silence: Duration,
    skip_offset: Duration,
    lanes: [GapLane; 2],
}

impl GapDetector {
    /// Build from engine params. Out-of-range values are clamped here
    /// (idempotent when the caller already clamped).
    pub fn new(params: &EngineParams) -> Self {
        let p = params.clamped();
        Self {
            threshold_db: p.gap_threshold_db,
            min_silence: p.gap_min_silence(),
            skip_offset: p.gap_skip_offset(),
            lanes: [GapLane::default(); 2],
        }
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    pub fn min_silence(&self) -> Duration {
        self.min_silence
    }

    pub fn skip_offset(&self) -> Duration {
        self.skip_offset
    }

    fn lane_mut(&mut self, channel: ChannelId) -> &mut GapLane {
        match channel {
            ChannelId::A => &mut self.lanes[0],
            ChannelId::B => &mut self.lanes[1],
        }
    }

    fn lane(&self, channel: ChannelId) -> &GapLane {
        match channel {
            ChannelId::A => &self.lanes[0],
            ChannelId::B => &self.lanes[1],
        }
    }

    /// Feed one level sample for a channel.
    ///
    /// `interval` is the real sampling cadence and is what the silence
    /// accumulator advances by. Returns the skip action at most once per
    /// continuous silence episode.
    pub fn sample(
        &mut self,
        channel: ChannelId,
        level_db: f32,
        interval: Duration,
    ) -> Option<GapAction> {
        let threshold = self.threshold_db;
        let min_silence = self.min_silence;
        let skip_offset = self.skip_offset;
        let lane = self.lane_mut(channel);

        if level_db < threshold {
            lane.silent_for += interval;
            if lane.silent_for >= min_silence && !lane.armed {
                lane.armed = true;
                info!(
                    "gap detected on channel {}: {:.1} dBFS for {:.1}s, skipping {}s ahead",
                    channel,
                    level_db,
                    lane.silent_for.as_secs_f64(),
                    skip_offset.as_secs()
                );
                return Some(GapAction::SkipAhead(skip_offset));
            }
        } else {
            // Episode over; the lane may fire again on the next one
            lane.silent_for = Duration::ZERO;
            lane.armed = false;
        }
        None
    }

    /// Clear one lane. Called on track change, seek, and commit.
    pub fn reset(&mut self, channel: ChannelId) {
        *self.lane_mut(channel) = GapLane::default();
    }

    /// Clear both lanes
    pub fn reset_all(&mut self) {
        self.lanes = [GapLane::default(); 2];
    }

    pub fn status(&self, channel: ChannelId) -> GapStatus {
        let lane = self.lane(channel);
        if lane.armed {
            GapStatus::Triggered
        } else if lane.silent_for > Duration::ZERO {
            GapStatus::Building {
                silent_for_ms: lane.silent_for.as_millis() as u64,
            }
        } else {
            GapStatus::Inactive
        }
    }
}
