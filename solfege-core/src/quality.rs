//! # Audio Quality Module
//!
//! Scores how usable the incoming signal is for transcription, so the user
//! can tell a bad microphone position or a clipping input from a quiet room.
//!
//! The score is a weighted blend of four components, each in [0, 1]:
//! - level: -60 dBFS maps to 0, -12 dBFS and louder to 1
//! - clarity: the MPM clarity of the frame
//! - tonality: one minus the spectral flatness
//! - headroom: penalised as soon as a few samples clip

use serde::{Deserialize, Serialize};

use crate::fft;

const LEVEL_FLOOR_DB: f32 = -60.0;
const LEVEL_CEILING_DB: f32 = -12.0;
const CLIP_LEVEL: f32 = 0.99;

const LEVEL_WEIGHT: f32 = 0.3;
const CLARITY_WEIGHT: f32 = 0.4;
const TONALITY_WEIGHT: f32 = 0.2;
const HEADROOM_WEIGHT: f32 = 0.1;

/// Coarse quality band used for colouring the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityGrade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityGrade {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => QualityGrade::Excellent,
            60..=79 => QualityGrade::Good,
            40..=59 => QualityGrade::Fair,
            _ => QualityGrade::Poor,
        }
    }
}

/// Quality measurements for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// RMS level in dBFS.
    pub level_db: f32,
    /// MPM clarity, 0 when no estimate was made.
    pub clarity: f32,
    /// Fraction of samples at or above the clip level.
    pub clipping: f32,
    /// Spectral flatness of the frame.
    pub flatness: f32,
    /// Combined score, 0-100.
    pub score: u8,
    pub grade: QualityGrade,
}

impl Default for QualityReport {
    fn default() -> Self {
        Self {
            level_db: -120.0,
            clarity: 0.0,
            clipping: 0.0,
            flatness: 1.0,
            score: 0,
            grade: QualityGrade::Poor,
        }
    }
}

/// Converts a linear RMS value to dBFS, floored at -120 dB.
pub fn level_db(rms: f32) -> f32 {
    if rms <= 1e-6 { -120.0 } else { (20.0 * rms.log10()).max(-120.0) }
}

/// Assesses a frame given its RMS, optional clarity and magnitude spectrum.
pub fn assess(signal: &[f32], rms: f32, clarity: Option<f32>, magnitudes: &[f32]) -> QualityReport {
    if signal.is_empty() {
        return QualityReport::default();
    }

    let level_db = level_db(rms);
    let clarity = clarity.unwrap_or(0.0).clamp(0.0, 1.0);
    let clipping = signal.iter().filter(|s| s.abs() >= CLIP_LEVEL).count() as f32 / signal.len() as f32;
    let flatness = fft::spectral_flatness(magnitudes);

    let level = ((level_db - LEVEL_FLOOR_DB) / (LEVEL_CEILING_DB - LEVEL_FLOOR_DB)).clamp(0.0, 1.0);
    let tonality = 1.0 - flatness;
    let headroom = 1.0 - (clipping * 20.0).min(1.0);

    let blended = LEVEL_WEIGHT * level
        + CLARITY_WEIGHT * clarity
        + TONALITY_WEIGHT * tonality
        + HEADROOM_WEIGHT * headroom;
    let score = (blended * 100.0).round().clamp(0.0, 100.0) as u8;

    QualityReport {
        level_db,
        clarity,
        clipping,
        flatness,
        score,
        grade: QualityGrade::from_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::rms;

    fn report_for(signal: &[f32], clarity: Option<f32>) -> QualityReport {
        let magnitudes = fft::magnitude_spectrum(signal);
        assess(signal, rms(signal), clarity, &magnitudes)
    }

    fn sine(amplitude: f32) -> Vec<f32> {
        (0..2048)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect()
    }

    #[test]
    fn clean_tone_scores_excellent() {
        let report = report_for(&sine(0.5), Some(0.98));
        assert_eq!(report.grade, QualityGrade::Excellent);
        assert_eq!(report.clipping, 0.0);
    }

    #[test]
    fn silence_scores_poor() {
        let report = report_for(&vec![0.0; 2048], None);
        assert_eq!(report.grade, QualityGrade::Poor);
        assert_eq!(report.level_db, -120.0);
    }

    #[test]
    fn clipping_costs_points() {
        let clean = report_for(&sine(0.5), Some(0.98));
        let clipped: Vec<f32> = sine(3.0).into_iter().map(|s| s.clamp(-1.0, 1.0)).collect();
        let clipped = report_for(&clipped, Some(0.98));
        assert!(clipped.clipping > 0.1);
        assert!(clipped.score < clean.score);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(QualityGrade::from_score(100), QualityGrade::Excellent);
        assert_eq!(QualityGrade::from_score(79), QualityGrade::Good);
        assert_eq!(QualityGrade::from_score(40), QualityGrade::Fair);
        assert_eq!(QualityGrade::from_score(39), QualityGrade::Poor);
    }

    #[test]
    fn empty_frame_uses_defaults() {
        assert_eq!(assess(&[], 0.0, None, &[]), QualityReport::default());
    }
}
