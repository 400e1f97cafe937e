//! Mix curve implementations for channel transitions
//!
//! Each curve maps fade progress to a volume pair for the outgoing and
//! incoming channels. Curves are pure functions so the scheduler can apply
//! them at any step resolution.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Transition mix curves
///
/// Each curve offers a different handoff character:
/// - Fade: linear ramp both ways (precise, predictable)
/// - Smooth: cosine S-curve (gentle, musical)
/// - Full: incoming starts at full volume, outgoing ramps down
/// - Overlap: both channels at full volume, hard cut at commit
/// - Cue: no overlap at all; the next track starts when the current one ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixCurve {
    /// Linear: outgoing 1-t, incoming t
    Fade,
    /// S-Curve: s = 0.5 × (1 - cos(π × t)); outgoing 1-s, incoming s
    Smooth,
    /// Incoming jumps to 1.0 immediately; outgoing ramps down linearly
    Full,
    /// Both channels at full volume for the whole window
    Overlap,
    /// No early start; handoff happens at natural end of the current track
    Cue,
}

impl Default for MixCurve {
    fn default() -> Self {
        MixCurve::Fade
    }
}

impl MixCurve {
    /// All curve variants, for iteration in tests and validation
    pub fn all_variants() -> [MixCurve; 5] {
        [
            MixCurve::Fade,
            MixCurve::Smooth,
            MixCurve::Full,
            MixCurve::Overlap,
            MixCurve::Cue,
        ]
    }

    /// Whether this curve plays both channels at once during the window.
    ///
    /// `Cue` is the only curve that never overlaps; the scheduler skips
    /// early arming entirely for it.
    pub fn overlaps(&self) -> bool {
        !matches!(self, MixCurve::Cue)
    }

    /// Volume pair at normalized fade progress.
    ///
    /// # Arguments
    /// * `progress` - Normalized position through the fade (0.0 to 1.0)
    ///
    /// # Returns
    /// `(outgoing, incoming)` volume multipliers, each within [0.0, 1.0].
    /// Outgoing is non-increasing and incoming non-decreasing in `progress`
    /// for every curve.
    pub fn volume_pair(&self, progress: f32) -> (f32, f32) {
        let t = progress.clamp(0.0, 1.0);

        match self {
            MixCurve::Fade => (1.0 - t, t),
            MixCurve::Smooth => {
                let s = 0.5 * (1.0 - (PI * t).cos());
                (1.0 - s, s)
            }
            MixCurve::Full => (1.0 - t, 1.0),
            MixCurve::Overlap => (1.0, 1.0),
            // Nominal pair; a Cue transition never reaches the fade phase
            MixCurve::Cue => (1.0, 0.0),
        }
    }

    /// Parse a configuration string, case-insensitive
    pub fn parse(name: &str) -> Option<MixCurve> {
        match name.to_ascii_lowercase().as_str() {
            "fade" => Some(MixCurve::Fade),
            "smooth" => Some(MixCurve::Smooth),
            "full" => Some(MixCurve::Full),
            "overlap" => Some(MixCurve::Overlap),
            "cue" => Some(MixCurve::Cue),
            _ => None,
        }
    }

    /// Configuration name for this curve
    pub fn name(&self) -> &'static str {
        match self {
            MixCurve::Fade => "fade",
            MixCurve::Smooth => "smooth",
            MixCurve::Full => "full",
            MixCurve::Overlap => "overlap",
            MixCurve::Cue => "cue",
        }
    }
}
