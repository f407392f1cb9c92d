//! # Note Naming Module
//!
//! Maps frequencies onto equal-tempered MIDI pitches and names them, either in
//! fixed-do solfège (`Do`, `Ré`, `Mi`...) or with letter names (`C`, `D`, `E`...).
//!
//! ## Features
//! - Frequency to nearest pitch with a configurable A4 reference
//! - Solfège and letter spellings, with scientific octave numbers
//! - Name to pitch lookups for both systems
//! - Cent deviation between a measured and a target frequency
//! - Staff placement and LilyPond spelling for the score

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SolfegeError};

/// Fixed-do solfège names, starting at Do (C).
pub const SOLFEGE_NAMES: [&str; 12] = [
    "Do", "Do♯", "Ré", "Ré♯", "Mi", "Fa", "Fa♯", "Sol", "Sol♯", "La", "La♯", "Si",
];

/// Letter names, starting at C.
pub const LETTER_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// LilyPond (Dutch) spellings, starting at C.
const LILYPOND_NAMES: [&str; 12] = [
    "c", "cis", "d", "dis", "e", "f", "fis", "g", "gis", "a", "ais", "b",
];

/// Diatonic step of each pitch class within an octave (C=0 .. B=6).
/// Sharps share the step of the natural below them.
const DIATONIC_STEP: [i32; 12] = [0, 0, 1, 1, 2, 3, 3, 4, 4, 5, 5, 6];

/// MIDI number of A4.
pub const A4_MIDI: u8 = 69;

/// Which naming system to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteNaming {
    #[default]
    Solfege,
    Letter,
}

impl NoteNaming {
    /// The other naming system.
    pub fn toggled(self) -> Self {
        match self {
            NoteNaming::Solfege => NoteNaming::Letter,
            NoteNaming::Letter => NoteNaming::Solfege,
        }
    }

    fn table(self) -> &'static [&'static str; 12] {
        match self {
            NoteNaming::Solfege => &SOLFEGE_NAMES,
            NoteNaming::Letter => &LETTER_NAMES,
        }
    }
}

/// An equal-tempered pitch, stored as its MIDI note number (0-127).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pitch {
    midi: u8,
}

/// Lookup table from every spelled name ("La4", "A4", "Do♯3", "Do#3", "C#3") to its pitch.
static NAME_MAP: Lazy<BTreeMap<String, Pitch>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    for midi in 0..=127u8 {
        let pitch = Pitch { midi };
        for naming in [NoteNaming::Solfege, NoteNaming::Letter] {
            let name = pitch.name(naming);
            // Accept the ASCII sharp for solfège input too.
            map.insert(name.replace('♯', "#"), pitch);
            map.insert(name, pitch);
        }
    }
    map
});

impl Pitch {
    /// Middle C (C4 / Do4).
    pub const MIDDLE_C: Pitch = Pitch { midi: 60 };

    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi <= 127).then_some(Self { midi })
    }

    /// Finds the nearest equal-tempered pitch to `freq`.
    ///
    /// Returns `None` for silence-like input (non-finite or non-positive)
    /// and for frequencies that round outside the MIDI range.
    pub fn from_frequency(freq: f32, a4_hz: f32) -> Option<Self> {
        if !freq.is_finite() || freq <= 0.0 || a4_hz <= 0.0 {
            return None;
        }
        let midi = (12.0 * (freq / a4_hz).log2()).round() + A4_MIDI as f32;
        if (0.0..=127.0).contains(&midi) {
            Some(Self { midi: midi as u8 })
        } else {
            None
        }
    }

    /// Parses a name such as "La4", "Sol♯2", "Sol#2" or "G#2".
    pub fn from_name(name: &str) -> Result<Self> {
        NAME_MAP
            .get(name.trim())
            .copied()
            .ok_or_else(|| SolfegeError::UnknownNote(name.to_string()))
    }

    pub fn midi(self) -> u8 {
        self.midi
    }

    /// Pitch class, 0 = C/Do.
    pub fn pitch_class(self) -> usize {
        (self.midi % 12) as usize
    }

    /// Scientific octave number (MIDI 60 is octave 4).
    pub fn octave(self) -> i32 {
        self.midi as i32 / 12 - 1
    }

    /// Name of the pitch class alone, e.g. "Sol♯". This is what the live readout shows.
    pub fn class_name(self, naming: NoteNaming) -> &'static str {
        naming.table()[self.pitch_class()]
    }

    /// Full name with octave, e.g. "Sol♯3" or "G#3".
    pub fn name(self, naming: NoteNaming) -> String {
        format!("{}{}", self.class_name(naming), self.octave())
    }

    /// Equal-tempered frequency of this pitch.
    pub fn frequency(self, a4_hz: f32) -> f32 {
        a4_hz * 2.0_f32.powf((self.midi as f32 - A4_MIDI as f32) / 12.0)
    }

    /// True for the black-key pitch classes, spelled here as sharps.
    pub fn is_sharp(self) -> bool {
        matches!(self.pitch_class(), 1 | 3 | 6 | 8 | 10)
    }

    /// Diatonic steps above middle C; each staff line or space is one step.
    pub fn staff_step(self) -> i32 {
        (self.octave() - 4) * 7 + DIATONIC_STEP[self.pitch_class()]
    }

    /// LilyPond absolute spelling, e.g. `a'` for A4 and `c,` for C2.
    pub fn lilypond(self) -> String {
        let marks = self.octave() - 3;
        let suffix = if marks >= 0 {
            "'".repeat(marks as usize)
        } else {
            ",".repeat((-marks) as usize)
        };
        format!("{}{}", LILYPOND_NAMES[self.pitch_class()], suffix)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name(NoteNaming::Solfege))
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn a440_is_la4() {
        let pitch = Pitch::from_frequency(440.0, 440.0).unwrap();
        assert_eq!(pitch.midi(), 69);
        assert_eq!(pitch.class_name(NoteNaming::Solfege), "La");
        assert_eq!(pitch.name(NoteNaming::Letter), "A4");
    }

    #[test]
    fn rounds_to_nearest_semitone() {
        // 450 Hz is +39 cents from A4, 455 Hz is +58 cents (closer to A#4).
        assert_eq!(Pitch::from_frequency(450.0, 440.0).unwrap().midi(), 69);
        assert_eq!(Pitch::from_frequency(455.0, 440.0).unwrap().midi(), 70);
    }

    #[test]
    fn middle_c_names() {
        let c4 = Pitch::from_frequency(261.63, 440.0).unwrap();
        assert_eq!(c4, Pitch::MIDDLE_C);
        assert_eq!(c4.name(NoteNaming::Solfege), "Do4");
        assert_eq!(c4.staff_step(), 0);
        assert_eq!(c4.lilypond(), "c'");
    }

    #[test]
    fn rejects_invalid_frequencies() {
        assert!(Pitch::from_frequency(0.0, 440.0).is_none());
        assert!(Pitch::from_frequency(-5.0, 440.0).is_none());
        assert!(Pitch::from_frequency(f32::NAN, 440.0).is_none());
        assert!(Pitch::from_frequency(50_000.0, 440.0).is_none());
    }

    #[test]
    fn alternate_reference_pitch() {
        // With A4 = 415 Hz (baroque), 415 Hz is still La.
        let pitch = Pitch::from_frequency(415.0, 415.0).unwrap();
        assert_eq!(pitch.class_name(NoteNaming::Solfege), "La");
        assert_relative_eq!(pitch.frequency(415.0), 415.0, epsilon = 1e-3);
    }

    #[test]
    fn parses_both_naming_systems() {
        assert_eq!(Pitch::from_name("La4").unwrap().midi(), 69);
        assert_eq!(Pitch::from_name("A4").unwrap().midi(), 69);
        assert_eq!(Pitch::from_name("Fa♯2").unwrap().midi(), 42);
        assert_eq!(Pitch::from_name("Fa#2").unwrap().midi(), 42);
        assert_eq!(Pitch::from_name("Do-1").unwrap().midi(), 0);
        assert!(Pitch::from_name("H4").is_err());
    }

    #[test]
    fn staff_steps_and_accidentals() {
        let e4 = Pitch::from_name("E4").unwrap();
        let f_sharp4 = Pitch::from_name("F#4").unwrap();
        let b3 = Pitch::from_name("B3").unwrap();
        assert_eq!(e4.staff_step(), 2);
        assert_eq!(f_sharp4.staff_step(), 3);
        assert!(f_sharp4.is_sharp());
        assert_eq!(b3.staff_step(), -1);
        assert_eq!(Pitch::from_name("C2").unwrap().lilypond(), "c,");
    }

    #[test]
    fn cents_deviation() {
        assert_relative_eq!(cents_between(880.0, 440.0), 1200.0, epsilon = 1e-3);
        assert!(cents_between(445.0, 440.0) > 0.0);
        assert!(cents_between(435.0, 440.0) < 0.0);
    }
}
