//! # Analysis Pipeline Module
//!
//! Runs one frame of audio through the full analysis chain:
//! 1. Magnitude spectrum (FFT)
//! 2. McLeod pitch estimate
//! 3. Volume/clarity gating
//! 4. Nearest pitch and cents deviation
//! 5. Quality scoring
//! 6. Window-size adaptation for the next frame
//!
//! The same [`Analyzer`] serves the live worker thread and the offline
//! helpers at the bottom of this module.

use crate::audio::Framer;
use crate::config::Settings;
use crate::error::{Result, SolfegeError};
use crate::gate::{self, Gate};
use crate::notes::{self, Pitch};
use crate::pitch::PitchDetector;
use crate::quality;
use crate::score::Score;
use crate::transcriber::Transcriber;
use crate::window::WindowSizer;
use crate::{fft, AnalysisFrame};

/// Stateful per-session analyzer.
#[derive(Debug)]
pub struct Analyzer {
    a4_hz: f32,
    gate: Gate,
    sizer: WindowSizer,
    detector: PitchDetector,
}

impl Analyzer {
    pub fn new(settings: &Settings) -> Result<Self> {
        let sizer = WindowSizer::new(settings.window.clone());
        Ok(Self {
            a4_hz: settings.a4_hz,
            gate: Gate::new(&settings.gate, settings.a4_hz)?,
            detector: PitchDetector::new(sizer.current()),
            sizer,
        })
    }

    /// Window length the next frame should have.
    pub fn window_size(&self) -> usize {
        self.sizer.current()
    }

    /// Largest window the sizer may ask for.
    pub fn max_window_size(&self) -> usize {
        self.sizer.max_size()
    }

    /// Performs a full analysis on a single frame of audio data.
    pub fn analyze(&mut self, samples: &[f32], sample_rate: u32, timestamp: f64) -> AnalysisFrame {
        if self.detector.size() != samples.len() {
            self.detector = PitchDetector::new(samples.len());
        }

        let spectrum = fft::magnitude_spectrum(samples);
        let rms = gate::rms(samples);
        let estimate = self.detector.find_pitch(samples, sample_rate);
        let decision = self.gate.check(rms, estimate);

        let frequency = decision.estimate().map(|e| e.frequency);
        let pitch = frequency.and_then(|f| Pitch::from_frequency(f, self.a4_hz));
        let cents_deviation = match (frequency, pitch) {
            (Some(f), Some(p)) => Some(notes::cents_between(f, p.frequency(self.a4_hz))),
            _ => None,
        };

        let clarity = estimate.map(|e| e.clarity);
        let quality = quality::assess(samples, rms, clarity, &spectrum);

        self.sizer.observe(frequency, sample_rate);

        AnalysisFrame {
            timestamp,
            window_size: samples.len(),
            rms,
            gate: decision,
            frequency,
            clarity,
            pitch,
            cents_deviation,
            quality,
            spectrum,
        }
    }
}

/// Analyses a complete recording, frame by frame, as the live pipeline would.
pub fn analyze_samples(samples: &[f32], sample_rate: u32, settings: &Settings) -> Result<Vec<AnalysisFrame>> {
    if sample_rate == 0 {
        return Err(SolfegeError::InvalidAudio("sample rate is zero".to_string()));
    }
    let mut analyzer = Analyzer::new(settings)?;
    let mut framer = Framer::new(settings.window.hop_size, analyzer.max_window_size());
    framer.push(samples);

    let mut frames = Vec::new();
    while let Some(frame) = framer.next_frame(analyzer.window_size()) {
        let timestamp = frame.timestamp(sample_rate);
        frames.push(analyzer.analyze(&frame.samples, sample_rate, timestamp));
    }
    log::debug!("[ANALYSIS] {} frames from {} samples", frames.len(), samples.len());
    Ok(frames)
}

/// Transcribes a complete recording into a score.
pub fn transcribe_samples(samples: &[f32], sample_rate: u32, settings: &Settings) -> Result<Score> {
    let frames = analyze_samples(samples, sample_rate, settings)?;
    let mut transcriber = Transcriber::new(&settings.transcription);
    for frame in &frames {
        transcriber.push(frame);
    }
    let end = samples.len() as f64 / sample_rate as f64;
    transcriber.finish(end);
    Ok(transcriber.into_score())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateDecision;

    const SR: u32 = 44_100;

    fn tone(freq: f32, secs: f32) -> Vec<f32> {
        let len = (secs * SR as f32) as usize;
        (0..len)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn analyzes_a_clear_tone() {
        let mut analyzer = Analyzer::new(&Settings::default()).unwrap();
        let frame = analyzer.analyze(&tone(440.0, 0.05)[..2048], SR, 0.05);
        assert!(matches!(frame.gate, GateDecision::Pitched(_)));
        assert_eq!(frame.pitch.map(Pitch::midi), Some(69));
        assert!(frame.cents_deviation.unwrap().abs() < 5.0);
        assert_eq!(frame.window_size, 2048);
        assert_eq!(frame.spectrum.len(), 1024);
    }

    #[test]
    fn silence_is_gated_out() {
        let mut analyzer = Analyzer::new(&Settings::default()).unwrap();
        let frame = analyzer.analyze(&vec![0.0; 2048], SR, 0.0);
        assert_eq!(frame.gate, GateDecision::Silent);
        assert!(frame.pitch.is_none());
        assert!(frame.frequency.is_none());
    }

    #[test]
    fn window_adapts_to_low_notes() {
        let frames = analyze_samples(&tone(82.41, 1.0), SR, &Settings::default()).unwrap();
        assert_eq!(frames.first().unwrap().window_size, 2048);
        assert_eq!(frames.last().unwrap().window_size, 4096);
        assert!(frames.iter().rev().take(5).all(|f| f.pitch.map(Pitch::midi) == Some(40)));
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        assert!(analyze_samples(&[0.0; 4096], 0, &Settings::default()).is_err());
    }
}
