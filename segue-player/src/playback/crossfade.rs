//! Channel transition scheduler
//!
//! Watches the active channel's remaining time and, inside the configured
//! window, ramps the next track in on the standby channel over a fixed
//! number of volume steps, then commits the handoff. At most one transition
//! is ever in flight; everything here runs on the decision loop.
//!
//! Fade progress accumulates tick time rather than reading the wall clock,
//! so pausing playback (which pauses the tick) freezes the fade with it.

use crate::error::{Error, Result};
use crate::playback::channel::ChannelPair;
use segue_common::curves::MixCurve;
use segue_common::{EngineParams, Track};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Transition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TransitionState {
    /// No transition in progress
    Idle,
    /// Standby channel loaded and audible at fade 0; first step pending
    Armed,
    /// Volume ramp in progress at the given step (0-based)
    Fading { step: u32 },
    /// Final handoff running; never observable between ticks
    Committing,
}

/// What a scheduler tick did, for the controller to act on
#[derive(Debug)]
pub enum TickEffect {
    /// Nothing changed
    None,
    /// A transition armed: `to` is now ramping in over `from`
    Armed { from: Uuid, to: Uuid },
    /// Arming failed; the active channel is untouched
    ArmFailed { track_id: Uuid, reason: String },
    /// The fade advanced to a new step
    FadeStep {
        step: u32,
        active_volume: f32,
        standby_volume: f32,
    },
    /// Handoff complete: the standby channel became active
    Committed,
    /// The active track played to its end with no transition armed
    Finished,
}

/// Dual-channel crossfade scheduler
pub struct CrossfadeScheduler {
    window: Duration,
    steps: u32,
    curve: MixCurve,
    state: TransitionState,
    fade_elapsed: Duration,
    /// Track ramping in on the standby channel while non-Idle
    incoming: Option<Uuid>,
    /// Next track that failed to arm; not retried until the playlist changes
    failed_next: Option<Uuid>,
}

impl CrossfadeScheduler {
    pub fn new(params: &EngineParams) -> Self {
        Self {
            window: params.crossfade_window(),
            steps: params.crossfade_steps.max(1),
            curve: params.mix_curve,
            state: TransitionState::Idle,
            fade_elapsed: Duration::ZERO,
            incoming: None,
            failed_next: None,
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransitionState::Idle
    }

    /// Track currently ramping in, while a transition is in flight
    pub fn incoming(&self) -> Option<Uuid> {
        self.incoming
    }

    pub fn curve(&self) -> MixCurve {
        self.curve
    }

    pub fn window_seconds(&self) -> f64 {
        self.window.as_secs_f64()
    }

    /// Forget a remembered arm failure; called whenever the playlist changes
    pub fn note_playlist_changed(&mut self) {
        self.failed_next = None;
    }

    /// Load and start a track on the active channel at full fade.
    ///
    /// Rejected outright while a transition is in flight; callers must
    /// cancel first. On success any remembered arm failure is cleared.
    pub fn begin_track(
        &mut self,
        channels: &mut ChannelPair,
        track: &Track,
        master: f32,
    ) -> Result<()> {
        if !self.is_idle() {
            return Err(Error::TransitionBusy);
        }
        channels.active_mut().start(track, master, 1.0)?;
        self.failed_next = None;
        Ok(())
    }

    /// Periodic evaluation, called once per engine tick while playing.
    ///
    /// `next` is the playlist's upcoming track, if any. `tick_interval` is
    /// the cadence the caller runs at; fade progress advances by exactly
    /// that much per call.
    pub fn tick(
        &mut self,
        channels: &mut ChannelPair,
        next: Option<&Track>,
        tick_interval: Duration,
        master: f32,
    ) -> TickEffect {
        match self.state {
            TransitionState::Idle => self.tick_idle(channels, next, master),
            TransitionState::Armed | TransitionState::Fading { .. } => {
                self.tick_fading(channels, tick_interval, master)
            }
            // Commit completes within a single tick; nothing to do here
            TransitionState::Committing => TickEffect::None,
        }
    }

    fn tick_idle(
        &mut self,
        channels: &mut ChannelPair,
        next: Option<&Track>,
        master: f32,
    ) -> TickEffect {
        let active = channels.active();
        let Some(active_track) = active.loaded_track() else {
            return TickEffect::None;
        };

        if active.is_finished() {
            return TickEffect::Finished;
        }

        // Cue mode never overlaps; handoff happens on natural end
        if !self.curve.overlaps() {
            return TickEffect::None;
        }

        // Without a known duration there is no remaining-time to test
        let Some(duration) = active.duration() else {
            return TickEffect::None;
        };
        let remaining = duration.saturating_sub(active.position());
        if remaining > self.window {
            return TickEffect::None;
        }

        let Some(next_track) = next else {
            return TickEffect::None;
        };
        if self.failed_next == Some(next_track.id) {
            return TickEffect::None;
        }
        if !next_track.is_start_ready() {
            // A prefetch may still complete while the window is open
            return TickEffect::None;
        }

        match channels.standby_mut().start(next_track, master, 0.0) {
            Ok(()) => {
                self.state = TransitionState::Armed;
                self.fade_elapsed = Duration::ZERO;
                self.incoming = Some(next_track.id);
                info!(
                    "transition armed: {} -> {} ({}s window, {} steps, {} curve)",
                    active_track,
                    next_track.id,
                    self.window.as_secs_f64(),
                    self.steps,
                    self.curve.name()
                );
                TickEffect::Armed {
                    from: active_track,
                    to: next_track.id,
                }
            }
            Err(e) => {
                warn!(
                    "standby load failed for {}: {} (transition aborted)",
                    next_track.display_name(),
                    e
                );
                channels.standby_mut().stop();
                self.failed_next = Some(next_track.id);
                TickEffect::ArmFailed {
                    track_id: next_track.id,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn tick_fading(
        &mut self,
        channels: &mut ChannelPair,
        tick_interval: Duration,
        master: f32,
    ) -> TickEffect {
        self.fade_elapsed += tick_interval;

        let progress = self.fade_elapsed.as_secs_f32() / self.window.as_secs_f32().max(f32::MIN_POSITIVE);
        let step = ((progress * self.steps as f32).floor() as u32).min(self.steps);

        if step >= self.steps {
            return self.commit(channels, master);
        }

        let already_at = match self.state {
            TransitionState::Fading { step } => Some(step),
            _ => None,
        };
        if already_at == Some(step) {
            return TickEffect::None;
        }

        let (active_volume, standby_volume) =
            self.curve.volume_pair(step as f32 / self.steps as f32);
        channels.active_mut().set_fade(active_volume, master);
        channels.standby_mut().set_fade(standby_volume, master);
        self.state = TransitionState::Fading { step };
        debug!(
            "fade step {}/{}: active {:.2}, standby {:.2}",
            step, self.steps, active_volume, standby_volume
        );
        TickEffect::FadeStep {
            step,
            active_volume,
            standby_volume,
        }
    }

    /// Atomic handoff: mute and stop the outgoing channel, promote the
    /// standby channel, return to Idle. No await points in here.
    fn commit(&mut self, channels: &mut ChannelPair, master: f32) -> TickEffect {
        self.state = TransitionState::Committing;

        channels.active_mut().set_fade(0.0, master);
        channels.active_mut().stop();
        channels.swap_active();
        channels.active_mut().set_fade(1.0, master);

        self.state = TransitionState::Idle;
        self.incoming = None;
        self.fade_elapsed = Duration::ZERO;
        info!("transition committed: channel {} now active", channels.active_id());
        TickEffect::Committed
    }

    /// Abort any in-flight transition. Stops the standby channel and
    /// restores the active channel to full fade. Returns whether there was
    /// anything to cancel.
    pub fn cancel(&mut self, channels: &mut ChannelPair, master: f32) -> bool {
        if self.is_idle() {
            return false;
        }
        channels.standby_mut().stop();
        channels.active_mut().set_fade(1.0, master);
        self.state = TransitionState::Idle;
        self.incoming = None;
        self.fade_elapsed = Duration::ZERO;
        info!("transition cancelled");
        true
    }
}
