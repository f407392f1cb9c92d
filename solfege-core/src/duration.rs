//! Duration quantization: elapsed seconds to note values.
//!
//! Elapsed time is converted to beats at the score tempo and snapped to the
//! nearest bucket (in log ratio, so a 1.3-beat note is closer to a quarter
//! than a 1.7-beat one). Anything shorter than half a sixteenth is a glitch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest duration, in beats, that still becomes a note.
pub const MIN_BEATS: f64 = 0.125;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            NoteValue::Whole => 4.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 1.0,
            NoteValue::Eighth => 0.5,
            NoteValue::Sixteenth => 0.25,
        }
    }

    /// LilyPond duration number.
    pub fn lilypond(self) -> &'static str {
        match self {
            NoteValue::Whole => "1",
            NoteValue::Half => "2",
            NoteValue::Quarter => "4",
            NoteValue::Eighth => "8",
            NoteValue::Sixteenth => "16",
        }
    }

    /// Whether the note is drawn with a stem.
    pub fn has_stem(self) -> bool {
        self != NoteValue::Whole
    }

    /// Whether the notehead is drawn hollow.
    pub fn is_hollow(self) -> bool {
        matches!(self, NoteValue::Whole | NoteValue::Half)
    }

    /// Number of flags on the stem.
    pub fn flags(self) -> usize {
        match self {
            NoteValue::Eighth => 1,
            NoteValue::Sixteenth => 2,
            _ => 0,
        }
    }
}

/// A note value, optionally dotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteDuration {
    pub value: NoteValue,
    pub dotted: bool,
}

impl NoteDuration {
    pub const fn plain(value: NoteValue) -> Self {
        Self { value, dotted: false }
    }

    pub const fn dotted(value: NoteValue) -> Self {
        Self { value, dotted: true }
    }

    pub fn beats(self) -> f64 {
        let base = self.value.beats();
        if self.dotted { base * 1.5 } else { base }
    }

    pub fn seconds(self, tempo_bpm: f32) -> f64 {
        self.beats() * 60.0 / tempo_bpm as f64
    }

    pub fn lilypond(self) -> String {
        format!("{}{}", self.value.lilypond(), if self.dotted { "." } else { "" })
    }
}

impl fmt::Display for NoteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.value {
            NoteValue::Whole => "whole",
            NoteValue::Half => "half",
            NoteValue::Quarter => "quarter",
            NoteValue::Eighth => "eighth",
            NoteValue::Sixteenth => "sixteenth",
        };
        if self.dotted {
            write!(f, "dotted {name}")
        } else {
            f.write_str(name)
        }
    }
}

/// Quantization buckets, longest first.
const BUCKETS: [NoteDuration; 8] = [
    NoteDuration::plain(NoteValue::Whole),
    NoteDuration::dotted(NoteValue::Half),
    NoteDuration::plain(NoteValue::Half),
    NoteDuration::dotted(NoteValue::Quarter),
    NoteDuration::plain(NoteValue::Quarter),
    NoteDuration::dotted(NoteValue::Eighth),
    NoteDuration::plain(NoteValue::Eighth),
    NoteDuration::plain(NoteValue::Sixteenth),
];

/// Converts seconds to beats at `tempo_bpm`.
pub fn seconds_to_beats(seconds: f64, tempo_bpm: f32) -> f64 {
    seconds * tempo_bpm as f64 / 60.0
}

/// Snaps an elapsed time to the nearest bucket.
///
/// Returns `None` for glitches (under [`MIN_BEATS`]) and invalid input.
/// Durations of four beats and more become a whole note; use [`split`] to
/// keep their full length.
pub fn quantize(seconds: f64, tempo_bpm: f32) -> Option<NoteDuration> {
    if !(seconds > 0.0) || !(tempo_bpm > 0.0) {
        return None;
    }
    quantize_beats(seconds_to_beats(seconds, tempo_bpm))
}

fn quantize_beats(beats: f64) -> Option<NoteDuration> {
    if !beats.is_finite() || beats < MIN_BEATS {
        return None;
    }
    // Ties go to the longer bucket because BUCKETS is longest first and
    // min_by keeps the first of equal elements.
    BUCKETS.iter().copied().min_by(|a, b| {
        let da = (beats / a.beats()).log2().abs();
        let db = (beats / b.beats()).log2().abs();
        da.total_cmp(&db)
    })
}

/// Quantizes an arbitrarily long duration into a run of tied values.
///
/// Whole notes are emitted while at least four beats remain; the remainder is
/// quantized normally and dropped if it is a glitch.
pub fn split(seconds: f64, tempo_bpm: f32) -> Vec<NoteDuration> {
    if !(seconds > 0.0) || !(tempo_bpm > 0.0) {
        return Vec::new();
    }
    let whole = NoteDuration::plain(NoteValue::Whole);
    let mut remaining = seconds_to_beats(seconds, tempo_bpm);
    let mut pieces = Vec::new();
    while remaining >= whole.beats() {
        pieces.push(whole);
        remaining -= whole.beats();
    }
    pieces.extend(quantize_beats(remaining));
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPO: f32 = 60.0; // one beat per second

    #[test]
    fn exact_values() {
        assert_eq!(quantize(1.0, TEMPO), Some(NoteDuration::plain(NoteValue::Quarter)));
        assert_eq!(quantize(0.5, TEMPO), Some(NoteDuration::plain(NoteValue::Eighth)));
        assert_eq!(quantize(3.0, TEMPO), Some(NoteDuration::dotted(NoteValue::Half)));
        assert_eq!(quantize(0.25, TEMPO), Some(NoteDuration::plain(NoteValue::Sixteenth)));
    }

    #[test]
    fn nearest_bucket_in_log_ratio() {
        assert_eq!(quantize(1.1, TEMPO), Some(NoteDuration::plain(NoteValue::Quarter)));
        assert_eq!(quantize(1.4, TEMPO), Some(NoteDuration::dotted(NoteValue::Quarter)));
        assert_eq!(quantize(0.6, TEMPO), Some(NoteDuration::plain(NoteValue::Eighth)));
    }

    #[test]
    fn tempo_scales_durations() {
        // At 120 bpm half a second is one beat.
        assert_eq!(quantize(0.5, 120.0), Some(NoteDuration::plain(NoteValue::Quarter)));
    }

    #[test]
    fn glitches_are_dropped() {
        assert_eq!(quantize(0.1, TEMPO), None);
        assert_eq!(quantize(0.0, TEMPO), None);
        assert_eq!(quantize(1.0, 0.0), None);
    }

    #[test]
    fn long_notes_clamp_to_whole() {
        assert_eq!(quantize(9.0, TEMPO), Some(NoteDuration::plain(NoteValue::Whole)));
    }

    #[test]
    fn split_keeps_long_durations() {
        let pieces = split(6.0, TEMPO);
        assert_eq!(
            pieces,
            vec![NoteDuration::plain(NoteValue::Whole), NoteDuration::plain(NoteValue::Half)]
        );
        assert_eq!(split(4.05, TEMPO), vec![NoteDuration::plain(NoteValue::Whole)]);
        assert_eq!(split(1.0, TEMPO), vec![NoteDuration::plain(NoteValue::Quarter)]);
    }

    #[test]
    fn lilypond_and_display() {
        let dotted_quarter = NoteDuration::dotted(NoteValue::Quarter);
        assert_eq!(dotted_quarter.lilypond(), "4.");
        assert_eq!(dotted_quarter.to_string(), "dotted quarter");
        assert!((dotted_quarter.seconds(120.0) - 0.75).abs() < 1e-9);
    }
}
