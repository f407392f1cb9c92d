// solfege-core/src/lib.rs

//! The core logic for the solfège transcriber.
//! This crate is responsible for audio capture and playback, pitch
//! detection, note naming, segmentation and the score model. It is
//! completely headless and contains no GUI code.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod duration;
pub mod error;
pub mod fft;
pub mod gate;
pub mod notes;
pub mod pitch;
pub mod quality;
pub mod score;
pub mod segment;
pub mod synth;
pub mod transcriber;
pub mod window;

pub use error::{Result, SolfegeError};

use gate::GateDecision;
use notes::Pitch;
use quality::QualityReport;

/// Represents the result of a single audio analysis frame.
#[derive(Debug, Clone)]
pub struct AnalysisFrame {
    /// Seconds since the start of the session (end of the frame).
    pub timestamp: f64,
    /// Length of the analysis window used for this frame.
    pub window_size: usize,
    /// RMS level of the frame.
    pub rms: f32,
    /// Outcome of volume/clarity gating.
    pub gate: GateDecision,
    /// The detected frequency in Hz, only for gated-in frames.
    pub frequency: Option<f32>,
    /// MPM clarity of the raw estimate, even when gated out.
    pub clarity: Option<f32>,
    /// Nearest pitch to the detected frequency.
    pub pitch: Option<Pitch>,
    /// The deviation from that pitch in cents.
    pub cents_deviation: Option<f32>,
    /// Signal quality for the meter.
    pub quality: QualityReport,
    /// Data for the spectrum visualization.
    pub spectrum: Vec<f32>,
}
