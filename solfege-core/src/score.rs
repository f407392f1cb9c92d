//! # Score Module
//!
//! The evolving score: an ordered list of notes and rests at a fixed tempo
//! and time signature, grouped into measures for display and exported to
//! LilyPond or JSON.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::duration::NoteDuration;
use crate::error::{Result, SolfegeError};
use crate::notes::{NoteNaming, Pitch};

/// A single entry in the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreEvent {
    Note {
        pitch: Pitch,
        duration: NoteDuration,
        /// Tied to the following note of the same pitch.
        #[serde(default)]
        tied: bool,
    },
    Rest {
        duration: NoteDuration,
    },
}

impl ScoreEvent {
    pub fn duration(&self) -> NoteDuration {
        match self {
            ScoreEvent::Note { duration, .. } | ScoreEvent::Rest { duration } => *duration,
        }
    }

    pub fn pitch(&self) -> Option<Pitch> {
        match self {
            ScoreEvent::Note { pitch, .. } => Some(*pitch),
            ScoreEvent::Rest { .. } => None,
        }
    }

    pub fn beats(&self) -> f64 {
        self.duration().beats()
    }

    /// Short human-readable form, e.g. "La4 quarter" or "rest half".
    pub fn describe(&self, naming: NoteNaming) -> String {
        match self {
            ScoreEvent::Note { pitch, duration, tied } => {
                format!("{} {}{}", pitch.name(naming), duration, if *tied { " ~" } else { "" })
            }
            ScoreEvent::Rest { duration } => format!("rest {duration}"),
        }
    }
}

/// Fastest tempo a score may carry.
pub const MAX_TEMPO_BPM: f32 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u8,
    pub unit: u8,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature { beats: 4, unit: 4 };

    /// At least one beat per measure, on a power-of-two note value.
    pub fn is_valid(self) -> bool {
        self.beats > 0 && self.unit.is_power_of_two()
    }

    /// Length of one measure in quarter-note beats.
    pub fn measure_beats(self) -> f64 {
        self.beats as f64 * 4.0 / self.unit.max(1) as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    /// Staff step (relative to middle C) of the bottom line.
    pub fn bottom_line_step(self) -> i32 {
        match self {
            Clef::Treble => 2, // E4
            Clef::Bass => -10, // G2
        }
    }

    pub fn lilypond(self) -> &'static str {
        match self {
            Clef::Treble => "treble",
            Clef::Bass => "bass",
        }
    }
}

/// One measure worth of events.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub events: Vec<ScoreEvent>,
    pub beats: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub tempo_bpm: f32,
    #[serde(default)]
    pub time_signature: TimeSignature,
    events: Vec<ScoreEvent>,
}

impl Score {
    pub fn new(tempo_bpm: f32, time_signature: TimeSignature) -> Self {
        Self {
            tempo_bpm,
            time_signature,
            events: Vec::new(),
        }
    }

    /// Checks that the tempo is within `(0, MAX_TEMPO_BPM]` and the time
    /// signature is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo_bpm > 0.0 && self.tempo_bpm <= MAX_TEMPO_BPM) {
            return Err(SolfegeError::InvalidScore(format!("tempo_bpm out of range: {}", self.tempo_bpm)));
        }
        if !self.time_signature.is_valid() {
            return Err(SolfegeError::InvalidScore(format!(
                "invalid time signature {}/{}",
                self.time_signature.beats, self.time_signature.unit
            )));
        }
        Ok(())
    }

    pub fn events(&self) -> &[ScoreEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn push(&mut self, event: ScoreEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = ScoreEvent>) {
        self.events.extend(events);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn total_beats(&self) -> f64 {
        self.events.iter().map(ScoreEvent::beats).sum()
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_beats() * 60.0 / self.tempo_bpm as f64
    }

    pub fn note_count(&self) -> usize {
        self.events.iter().filter(|e| e.pitch().is_some()).count()
    }

    /// Groups events into measures.
    ///
    /// Measures fill greedily; an event that would overflow the current
    /// measure starts the next one, so a measure may end short.
    pub fn measures(&self) -> Vec<Measure> {
        let capacity = self.time_signature.measure_beats();
        let mut measures = Vec::new();
        let mut current = Measure { events: Vec::new(), beats: 0.0 };

        for event in &self.events {
            let beats = event.beats();
            if !current.events.is_empty() && current.beats + beats > capacity + 1e-9 {
                measures.push(std::mem::replace(&mut current, Measure { events: Vec::new(), beats: 0.0 }));
            }
            current.events.push(*event);
            current.beats += beats;
        }
        if !current.events.is_empty() {
            measures.push(current);
        }
        measures
    }

    /// Bass clef when most notes sit below middle C.
    pub fn suggested_clef(&self) -> Clef {
        let (low, total) = self
            .events
            .iter()
            .filter_map(ScoreEvent::pitch)
            .fold((0usize, 0usize), |(low, total), p| {
                (low + usize::from(p < Pitch::MIDDLE_C), total + 1)
            });
        if total > 0 && low * 2 > total { Clef::Bass } else { Clef::Treble }
    }

    /// Renders the score as a standalone LilyPond file.
    pub fn to_lilypond(&self) -> String {
        let mut body = String::new();
        for (i, measure) in self.measures().iter().enumerate() {
            if i > 0 {
                body.push_str(" |\n    ");
            }
            let tokens: Vec<String> = measure
                .events
                .iter()
                .map(|event| match event {
                    ScoreEvent::Note { pitch, duration, tied } => {
                        format!("{}{}{}", pitch.lilypond(), duration.lilypond(), if *tied { "~" } else { "" })
                    }
                    ScoreEvent::Rest { duration } => format!("r{}", duration.lilypond()),
                })
                .collect();
            body.push_str(&tokens.join(" "));
        }

        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "\\version \"2.24.0\"");
        let _ = writeln!(out, "\\score {{");
        let _ = writeln!(out, "  \\new Staff {{");
        let _ = writeln!(out, "    \\clef {}", self.suggested_clef().lilypond());
        let _ = writeln!(out, "    \\time {}/{}", self.time_signature.beats, self.time_signature.unit);
        let _ = writeln!(out, "    \\tempo 4 = {}", self.tempo_bpm.round() as u32);
        let _ = writeln!(out, "    {} \\bar \"|.\"", body);
        let _ = writeln!(out, "  }}");
        let _ = writeln!(out, "  \\layout {{ }}");
        let _ = writeln!(out, "  \\midi {{ }}");
        let _ = writeln!(out, "}}");
        out
    }

    /// Saves the score as pretty-printed JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads a score saved with [`Score::save_json`] and validates it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let score: Score = serde_json::from_str(&data)?;
        score.validate()?;
        Ok(score)
    }

    pub fn save_lilypond(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_lilypond())?;
        Ok(())
    }
}
