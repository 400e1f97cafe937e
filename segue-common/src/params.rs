//! Engine tuning parameters
//!
//! All tunables for the transition scheduler and the gap detector live in a
//! single `EngineParams` struct, loaded from the daemon config file and
//! passed by reference to the components that need them. Out-of-range values
//! are clamped at the boundary with a warning; they never abort startup.

use crate::curves::MixCurve;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Valid range for `crossfade_window_seconds`
pub const CROSSFADE_WINDOW_RANGE: (f64, f64) = (0.5, 30.0);
/// Valid range for `crossfade_steps`
pub const CROSSFADE_STEPS_RANGE: (u32, u32) = (2, 200);
/// Valid range for `gap_threshold_db`
pub const GAP_THRESHOLD_RANGE: (f32, f32) = (-60.0, -20.0);
/// Valid range for `gap_min_silence_seconds`
pub const GAP_MIN_SILENCE_RANGE: (f64, f64) = (0.5, 5.0);
/// Valid range for `gap_skip_offset_seconds`
pub const GAP_SKIP_OFFSET_RANGE: (f64, f64) = (1.0, 60.0);
/// Valid range for `gap_sampling_interval_ms`
pub const GAP_SAMPLING_INTERVAL_RANGE: (u64, u64) = (20, 1000);

/// Engine tuning parameters
///
/// Read-frequently, write-never after startup. The decision loop owns the
/// authoritative copy; nothing reads parameters through ambient global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Transition window: arm a crossfade when this much play time remains
    ///
    /// Valid range: [0.5, 30.0] seconds
    /// Default: 4.0
    /// Also the duration the volume fade runs over.
    pub crossfade_window_seconds: f64,

    /// Number of fixed volume steps across the fade window
    ///
    /// Valid range: [2, 200]
    /// Default: 20
    pub crossfade_steps: u32,

    /// Volume curve applied during the transition window
    ///
    /// Default: fade (linear)
    pub mix_curve: MixCurve,

    /// Output level below which a sample counts as silence
    ///
    /// Valid range: [-60.0, -20.0] dBFS
    /// Default: -46.0
    pub gap_threshold_db: f32,

    /// Continuous silence required before the skip fires
    ///
    /// Valid range: [0.5, 5.0] seconds
    /// Default: 2.0
    pub gap_min_silence_seconds: f64,

    /// How far the gap skip jumps forward
    ///
    /// Valid range: [1.0, 60.0] seconds
    /// Default: 10.0
    pub gap_skip_offset_seconds: f64,

    /// Output level sampling cadence, shared with the scheduler tick
    ///
    /// Valid range: [20, 1000] milliseconds
    /// Default: 100
    pub gap_sampling_interval_ms: u64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            crossfade_window_seconds: 4.0,
            crossfade_steps: 20,
            mix_curve: MixCurve::Fade,
            gap_threshold_db: -46.0,
            gap_min_silence_seconds: 2.0,
            gap_skip_offset_seconds: 10.0,
            gap_sampling_interval_ms: 100,
        }
    }
}

impl EngineParams {
    /// Return a copy with every field forced into its valid range.
    ///
    /// Each clamp logs a warning naming the field and both values. Callers
    /// always go through this before handing params to the engine.
    pub fn clamped(&self) -> Self {
        let mut p = self.clone();

        p.crossfade_window_seconds = clamp_f64(
            "crossfade_window_seconds",
            p.crossfade_window_seconds,
            CROSSFADE_WINDOW_RANGE,
        );
        p.crossfade_steps = clamp_u32("crossfade_steps", p.crossfade_steps, CROSSFADE_STEPS_RANGE);
        p.gap_threshold_db = clamp_f32("gap_threshold_db", p.gap_threshold_db, GAP_THRESHOLD_RANGE);
        p.gap_min_silence_seconds = clamp_f64(
            "gap_min_silence_seconds",
            p.gap_min_silence_seconds,
            GAP_MIN_SILENCE_RANGE,
        );
        p.gap_skip_offset_seconds = clamp_f64(
            "gap_skip_offset_seconds",
            p.gap_skip_offset_seconds,
            GAP_SKIP_OFFSET_RANGE,
        );
        p.gap_sampling_interval_ms = clamp_u64(
            "gap_sampling_interval_ms",
            p.gap_sampling_interval_ms,
            GAP_SAMPLING_INTERVAL_RANGE,
        );

        p
    }

    /// Transition window as a Duration
    pub fn crossfade_window(&self) -> Duration {
        Duration::from_secs_f64(self.crossfade_window_seconds)
    }

    /// Required continuous silence as a Duration
    pub fn gap_min_silence(&self) -> Duration {
        Duration::from_secs_f64(self.gap_min_silence_seconds)
    }

    /// Gap skip distance as a Duration
    pub fn gap_skip_offset(&self) -> Duration {
        Duration::from_secs_f64(self.gap_skip_offset_seconds)
    }

    /// Sampling/tick cadence as a Duration
    pub fn gap_sampling_interval(&self) -> Duration {
        Duration::from_millis(self.gap_sampling_interval_ms)
    }
}

fn clamp_f64(field: &str, value: f64, range: (f64, f64)) -> f64 {
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        warn!(
            "{} = {} outside [{}, {}], clamped to {}",
            field, value, range.0, range.1, clamped
        );
    }
    clamped
}

fn clamp_f32(field: &str, value: f32, range: (f32, f32)) -> f32 {
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        warn!(
            "{} = {} outside [{}, {}], clamped to {}",
            field, value, range.0, range.1, clamped
        );
    }
    clamped
}

fn clamp_u32(field: &str, value: u32, range: (u32, u32)) -> u32 {
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        warn!(
            "{} = {} outside [{}, {}], clamped to {}",
            field, value, range.0, range.1, clamped
        );
    }
    clamped
}

fn clamp_u64(field: &str, value: u64, range: (u64, u64)) -> u64 {
    let clamped = value.clamp(range.0, range.1);
    if clamped != value {
        warn!(
            "{} = {} outside [{}, {}], clamped to {}",
            field, value, range.0, range.1, clamped
        );
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = EngineParams::default();
        assert_eq!(p.crossfade_window_seconds, 4.0);
        assert_eq!(p.crossfade_steps, 20);
        assert_eq!(p.mix_curve, MixCurve::Fade);
        assert_eq!(p.gap_threshold_db, -46.0);
        assert_eq!(p.gap_min_silence_seconds, 2.0);
        assert_eq!(p.gap_skip_offset_seconds, 10.0);
        assert_eq!(p.gap_sampling_interval_ms, 100);
    }

    #[test]
    fn test_defaults_are_already_in_range() {
        let p = EngineParams::default();
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn test_threshold_clamped_both_ends() {
        let mut p = EngineParams::default();

        p.gap_threshold_db = -80.0;
        assert_eq!(p.clamped().gap_threshold_db, -60.0);

        p.gap_threshold_db = -5.0;
        assert_eq!(p.clamped().gap_threshold_db, -20.0);
    }

    #[test]
    fn test_min_silence_clamped() {
        let mut p = EngineParams::default();

        p.gap_min_silence_seconds = 0.05;
        assert_eq!(p.clamped().gap_min_silence_seconds, 0.5);

        p.gap_min_silence_seconds = 60.0;
        assert_eq!(p.clamped().gap_min_silence_seconds, 5.0);
    }

    #[test]
    fn test_window_and_steps_clamped() {
        let mut p = EngineParams::default();
        p.crossfade_window_seconds = 0.0;
        p.crossfade_steps = 1;

        let c = p.clamped();
        assert_eq!(c.crossfade_window_seconds, 0.5);
        assert_eq!(c.crossfade_steps, 2);
    }

    #[test]
    fn test_duration_accessors() {
        let p = EngineParams::default();
        assert_eq!(p.crossfade_window(), Duration::from_secs(4));
        assert_eq!(p.gap_min_silence(), Duration::from_secs(2));
        assert_eq!(p.gap_skip_offset(), Duration::from_secs(10));
        assert_eq!(p.gap_sampling_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_toml_round_trip_with_partial_fields() {
        // Unlisted fields fall back to defaults via serde(default)
        let parsed: EngineParams =
            serde_json::from_str(r#"{"gap_threshold_db": -50.0, "mix_curve": "smooth"}"#).unwrap();
        assert_eq!(parsed.gap_threshold_db, -50.0);
        assert_eq!(parsed.mix_curve, MixCurve::Smooth);
        assert_eq!(parsed.crossfade_steps, 20);
    }
}
