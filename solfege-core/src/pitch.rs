//! # Pitch Detection Module
//!
//! This module implements the McLeod Pitch Method (MPM) for monophonic
//! fundamental-frequency estimation, the same method used by the
//! browser-side pitch libraries this tool is usually compared with.
//!
//! ## Features
//! - FFT-based autocorrelation, preallocated per window size
//! - Normalized square difference function (NSDF)
//! - Key-maximum picking with a 0.9 cutoff to avoid octave errors
//! - Parabolic interpolation for sub-sample accuracy
//! - A clarity score in [0, 1] alongside every estimate

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Fraction of the highest NSDF peak a key maximum must reach to be chosen.
const KEY_MAXIMUM_CUTOFF: f32 = 0.9;

/// A single fundamental-frequency estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Estimated fundamental in Hz.
    pub frequency: f32,
    /// Height of the chosen NSDF peak; 1.0 is a perfectly periodic signal.
    pub clarity: f32,
}

/// McLeod pitch detector for a fixed input length.
///
/// Buffers and FFT plans are allocated once in [`PitchDetector::new`] so that
/// repeated calls to [`PitchDetector::find_pitch`] do not allocate.
pub struct PitchDetector {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
}

impl std::fmt::Debug for PitchDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchDetector").field("size", &self.size).finish()
    }
}

impl PitchDetector {
    /// Creates a detector for frames of exactly `size` samples.
    pub fn new(size: usize) -> Self {
        // Zero-padding to 2n turns the circular correlation into a linear one.
        let padded = (size * 2).max(1);
        let mut planner = FftPlanner::new();
        Self {
            size,
            forward: planner.plan_fft_forward(padded),
            inverse: planner.plan_fft_inverse(padded),
            scratch: vec![Complex { re: 0.0, im: 0.0 }; padded],
            nsdf: vec![0.0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Estimates the fundamental of `signal`.
    ///
    /// # Returns
    /// * `Some(estimate)` - frequency and clarity of the chosen peak
    /// * `None` - wrong frame length, silence, or no periodicity at all
    ///
    /// Callers apply their own clarity threshold; weak estimates are still returned.
    pub fn find_pitch(&mut self, signal: &[f32], sample_rate: u32) -> Option<PitchEstimate> {
        if signal.len() != self.size || self.size < 4 || sample_rate == 0 {
            return None;
        }

        self.compute_nsdf(signal);

        // Lags past half the frame overlap too few samples to be trusted.
        let maxima = key_maxima(&self.nsdf[..self.size / 2]);
        let highest = maxima.iter().map(|&tau| self.nsdf[tau]).fold(f32::MIN, f32::max);
        if maxima.is_empty() || highest <= 0.0 {
            return None;
        }

        let cutoff = highest * KEY_MAXIMUM_CUTOFF;
        let tau = maxima.into_iter().find(|&tau| self.nsdf[tau] >= cutoff)?;

        let (period, clarity) = self.interpolate_peak(tau);
        let frequency = sample_rate as f32 / period;

        if frequency.is_finite() && frequency > 0.0 {
            Some(PitchEstimate {
                frequency,
                clarity: clarity.clamp(0.0, 1.0),
            })
        } else {
            None
        }
    }

    /// Fills `self.nsdf` with n'(tau) = 2 r(tau) / m(tau).
    fn compute_nsdf(&mut self, signal: &[f32]) {
        let n = self.size;
        let padded = self.scratch.len();

        // --- Autocorrelation via FFT: r = IFFT(|FFT(x)|^2) ---
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            *slot = Complex {
                re: if i < n { signal[i] } else { 0.0 },
                im: 0.0,
            };
        }
        self.forward.process(&mut self.scratch);
        for c in self.scratch.iter_mut() {
            *c = Complex { re: c.norm_sqr(), im: 0.0 };
        }
        self.inverse.process(&mut self.scratch);
        let scale = 1.0 / padded as f32;

        // --- m(tau) = sum over the overlap of x_j^2 + x_{j+tau}^2, updated incrementally ---
        let mut m = 2.0 * signal.iter().map(|s| s * s).sum::<f32>();
        for tau in 0..n {
            if tau > 0 {
                let head = signal[tau - 1];
                let tail = signal[n - tau];
                m -= head * head + tail * tail;
            }
            let r = self.scratch[tau].re * scale;
            self.nsdf[tau] = if m > 1e-9 { 2.0 * r / m } else { 0.0 };
        }
    }

    /// Parabolic interpolation around `tau`; returns (period, peak value).
    fn interpolate_peak(&self, tau: usize) -> (f32, f32) {
        let y2 = self.nsdf[tau];
        if tau == 0 || tau + 1 >= self.nsdf.len() {
            return (tau as f32, y2);
        }
        let y1 = self.nsdf[tau - 1];
        let y3 = self.nsdf[tau + 1];
        let denominator = y1 - 2.0 * y2 + y3;
        if denominator.abs() < 1e-12 {
            return (tau as f32, y2);
        }
        let shift = (y1 - y3) / (2.0 * denominator);
        let value = y2 - 0.25 * (y1 - y3) * shift;
        (tau as f32 + shift, value)
    }
}

/// Highest lag of each positive NSDF lobe after the first zero crossing.
fn key_maxima(nsdf: &[f32]) -> Vec<usize> {
    let mut maxima = Vec::new();

    // The lobe around tau = 0 is always maximal; skip it.
    let mut tau = 1;
    while tau < nsdf.len() && nsdf[tau] > 0.0 {
        tau += 1;
    }

    let mut best: Option<usize> = None;
    while tau + 1 < nsdf.len() {
        if nsdf[tau] > 0.0 {
            if best.map_or(true, |b| nsdf[tau] > nsdf[b]) {
                best = Some(tau);
            }
        } else if let Some(b) = best.take() {
            maxima.push(b);
        }
        tau += 1;
    }
    if let Some(b) = best {
        maxima.push(b);
    }
    maxima
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn detects_a440() {
        let mut detector = PitchDetector::new(2048);
        let estimate = detector.find_pitch(&sine(440.0, 2048), SAMPLE_RATE).unwrap();
        assert!((estimate.frequency - 440.0).abs() < 1.0, "got {}", estimate.frequency);
        assert!(estimate.clarity > 0.95);
    }

    #[test]
    fn detects_low_and_high_tones() {
        let mut detector = PitchDetector::new(4096);
        for freq in [82.41_f32, 196.0, 1046.5] {
            let estimate = detector.find_pitch(&sine(freq, 4096), SAMPLE_RATE).unwrap();
            let error_cents = 1200.0 * (estimate.frequency / freq).log2();
            assert!(error_cents.abs() < 10.0, "{freq} Hz detected as {}", estimate.frequency);
        }
    }

    #[test]
    fn prefers_fundamental_over_harmonics() {
        // A rich tone with a strong second harmonic must not read an octave high.
        let len = 2048;
        let fundamental = 220.0;
        let signal: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let w = 2.0 * std::f32::consts::PI * fundamental * t;
                0.4 * w.sin() + 0.6 * (2.0 * w).sin() + 0.2 * (3.0 * w).sin()
            })
            .collect();
        let mut detector = PitchDetector::new(len);
        let estimate = detector.find_pitch(&signal, SAMPLE_RATE).unwrap();
        assert!((estimate.frequency - fundamental).abs() < 3.0, "got {}", estimate.frequency);
    }

    #[test]
    fn silence_has_no_pitch() {
        let mut detector = PitchDetector::new(1024);
        assert!(detector.find_pitch(&vec![0.0; 1024], SAMPLE_RATE).is_none());
    }

    #[test]
    fn noise_is_unclear() {
        let mut state = 42u32;
        let noise: Vec<f32> = (0..2048)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        let mut detector = PitchDetector::new(2048);
        let clarity = detector
            .find_pitch(&noise, SAMPLE_RATE)
            .map(|e| e.clarity)
            .unwrap_or(0.0);
        assert!(clarity < 0.9, "noise clarity {clarity}");
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut detector = PitchDetector::new(2048);
        assert!(detector.find_pitch(&sine(440.0, 1024), SAMPLE_RATE).is_none());
    }
}
