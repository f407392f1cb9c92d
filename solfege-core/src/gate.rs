//! Volume and clarity gating.
//!
//! Decides whether a frame carries a usable pitch before it is named,
//! segmented or drawn.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::notes::Pitch;
use crate::pitch::PitchEstimate;

/// Thresholds for accepting a pitch estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Minimum RMS level (linear, full scale = 1.0).
    pub min_rms: f32,
    /// Minimum MPM clarity.
    pub min_clarity: f32,
    /// Lowest note accepted, by name ("C2", "Do2"...).
    pub lowest_note: String,
    /// Highest note accepted, by name.
    pub highest_note: String,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            min_rms: 0.01,
            min_clarity: 0.9,
            lowest_note: "C2".to_string(),
            highest_note: "C7".to_string(),
        }
    }
}

/// Outcome of gating a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    /// Too quiet to analyse.
    Silent,
    /// Loud enough, but not periodic enough to trust.
    Unclear,
    /// Clear, but outside the configured note range.
    OutOfRange(PitchEstimate),
    /// A usable pitch.
    Pitched(PitchEstimate),
}

impl GateDecision {
    pub fn estimate(&self) -> Option<PitchEstimate> {
        match self {
            GateDecision::Pitched(estimate) => Some(*estimate),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GateDecision::Silent => "silent",
            GateDecision::Unclear => "unclear",
            GateDecision::OutOfRange(_) => "out of range",
            GateDecision::Pitched(_) => "pitched",
        }
    }
}

/// A gate with its note range resolved to frequencies.
#[derive(Debug, Clone)]
pub struct Gate {
    min_rms: f32,
    min_clarity: f32,
    lowest_hz: f32,
    highest_hz: f32,
}

impl Gate {
    /// Builds a gate, resolving the range names against the A4 reference.
    ///
    /// The range is widened by half a semitone on each side so that the
    /// boundary notes themselves pass even when slightly out of tune.
    pub fn new(settings: &GateSettings, a4_hz: f32) -> Result<Self> {
        let half_semitone = 2.0_f32.powf(1.0 / 24.0);
        let lowest = Pitch::from_name(&settings.lowest_note)?;
        let highest = Pitch::from_name(&settings.highest_note)?;
        Ok(Self {
            min_rms: settings.min_rms,
            min_clarity: settings.min_clarity,
            lowest_hz: lowest.frequency(a4_hz) / half_semitone,
            highest_hz: highest.frequency(a4_hz) * half_semitone,
        })
    }

    /// Lowest accepted frequency in Hz.
    pub fn lowest_hz(&self) -> f32 {
        self.lowest_hz
    }

    pub fn check(&self, rms: f32, estimate: Option<PitchEstimate>) -> GateDecision {
        if rms < self.min_rms {
            return GateDecision::Silent;
        }
        match estimate {
            Some(e) if e.clarity < self.min_clarity => GateDecision::Unclear,
            Some(e) if e.frequency < self.lowest_hz || e.frequency > self.highest_hz => {
                GateDecision::OutOfRange(e)
            }
            Some(e) => GateDecision::Pitched(e),
            None => GateDecision::Unclear,
        }
    }
}

/// Root-mean-square level of a frame.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(frequency: f32, clarity: f32) -> Option<PitchEstimate> {
        Some(PitchEstimate { frequency, clarity })
    }

    fn gate() -> Gate {
        Gate::new(&GateSettings::default(), 440.0).unwrap()
    }

    #[test]
    fn quiet_frames_are_silent() {
        assert_eq!(gate().check(0.001, estimate(440.0, 0.99)), GateDecision::Silent);
    }

    #[test]
    fn low_clarity_is_unclear() {
        assert_eq!(gate().check(0.2, estimate(440.0, 0.5)), GateDecision::Unclear);
        assert_eq!(gate().check(0.2, None), GateDecision::Unclear);
    }

    #[test]
    fn range_is_enforced() {
        let g = gate();
        assert!(matches!(g.check(0.2, estimate(30.0, 0.99)), GateDecision::OutOfRange(_)));
        assert!(matches!(g.check(0.2, estimate(5000.0, 0.99)), GateDecision::OutOfRange(_)));
        // C2 itself, slightly flat, is still inside.
        assert!(matches!(g.check(0.2, estimate(65.0, 0.99)), GateDecision::Pitched(_)));
    }

    #[test]
    fn clear_tone_passes() {
        let decision = gate().check(0.2, estimate(440.0, 0.95));
        assert_eq!(decision.estimate().map(|e| e.frequency), Some(440.0));
        assert_eq!(decision.label(), "pitched");
    }

    #[test]
    fn unknown_range_note_is_an_error() {
        let settings = GateSettings {
            lowest_note: "Q9".to_string(),
            ..GateSettings::default()
        };
        assert!(Gate::new(&settings, 440.0).is_err());
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        assert_eq!(rms(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        assert_eq!(rms(&[]), 0.0);
    }
}
