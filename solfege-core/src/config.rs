//! # Settings Module
//!
//! All tunable parameters, grouped by subsystem and persisted as JSON.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, SolfegeError};
use crate::gate::{Gate, GateSettings};
use crate::notes::{NoteNaming, Pitch};
use crate::score::{TimeSignature, MAX_TEMPO_BPM};
use crate::window::WindowSettings;

/// Segmentation and quantization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub tempo_bpm: f32,
    pub time_signature: TimeSignature,
    /// Frames a new pitch (or silence) must persist to start a new segment.
    pub min_note_frames: usize,
    /// Closed segments collected before they are quantized into the score.
    pub batch_size: usize,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            tempo_bpm: 90.0,
            time_signature: TimeSignature::COMMON,
            min_note_frames: 3,
            batch_size: 4,
        }
    }
}

/// Playback synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthSettings {
    pub sample_rate: u32,
    /// Peak output level, 0-1.
    pub volume: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
    /// Number of harmonics (1 = pure sine).
    pub harmonics: u32,
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            volume: 0.3,
            attack_secs: 0.01,
            release_secs: 0.08,
            harmonics: 3,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Reference frequency of La4 / A4.
    pub a4_hz: f32,
    pub naming: NoteNaming,
    pub gate: GateSettings,
    pub window: WindowSettings,
    pub transcription: TranscriptionSettings,
    pub synth: SynthSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            a4_hz: 440.0,
            naming: NoteNaming::Solfege,
            gate: GateSettings::default(),
            window: WindowSettings::default(),
            transcription: TranscriptionSettings::default(),
            synth: SynthSettings::default(),
        }
    }
}

impl Settings {
    /// Loads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("[CONFIG] {} not found, using default settings", path.display());
            return Ok(Self::default());
        }
        let settings = Self::load(path)?;
        log::info!("[CONFIG] Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.a4_hz > 0.0 && self.a4_hz.is_finite()) {
            return Err(SolfegeError::Config(format!("a4_hz must be positive, got {}", self.a4_hz)));
        }
        if !(0.0..=1.0).contains(&self.gate.min_clarity) {
            return Err(SolfegeError::Config("gate.min_clarity must be within 0..=1".to_string()));
        }
        if self.gate.min_rms < 0.0 {
            return Err(SolfegeError::Config("gate.min_rms must not be negative".to_string()));
        }
        Gate::new(&self.gate, self.a4_hz)?;
        if Pitch::from_name(&self.gate.lowest_note)? >= Pitch::from_name(&self.gate.highest_note)? {
            return Err(SolfegeError::Config(
                "gate.lowest_note must be below gate.highest_note".to_string(),
            ));
        }
        self.window.validate()?;

        let t = &self.transcription;
        if !(t.tempo_bpm > 0.0 && t.tempo_bpm <= MAX_TEMPO_BPM) {
            return Err(SolfegeError::Config(format!("tempo_bpm out of range: {}", t.tempo_bpm)));
        }
        if !t.time_signature.is_valid() {
            return Err(SolfegeError::Config("invalid time signature".to_string()));
        }
        if t.batch_size == 0 {
            return Err(SolfegeError::Config("batch_size must be at least 1".to_string()));
        }

        let s = &self.synth;
        if s.sample_rate == 0 || s.harmonics == 0 {
            return Err(SolfegeError::Config("synth sample_rate and harmonics must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&s.volume) || s.attack_secs < 0.0 || s.release_secs < 0.0 {
            return Err(SolfegeError::Config("synth volume or envelope out of range".to_string()));
        }
        Ok(())
    }
}
