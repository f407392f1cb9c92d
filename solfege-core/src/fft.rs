//! Frequency-domain helpers for the analysis pipeline: the magnitude spectrum
//! shown in the spectrum panel and the spectral flatness used by quality
//! scoring. Frames may be any length since the analysis window is adaptive.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::TAU;

/// Keeps logarithms finite on silent bins.
const EPSILON: f32 = 1e-12;

/// Hann coefficient for sample `i` of an `n`-sample frame.
fn hann(i: usize, n: usize) -> f32 {
    if n < 2 {
        return 1.0;
    }
    0.5 - 0.5 * (TAU * i as f32 / (n - 1) as f32).cos()
}

/// Magnitude spectrum of a time-domain frame, DC bin up to Nyquist.
///
/// The frame is mean-centred and Hann-windowed before the transform, so the
/// result has `signal.len() / 2` bins.
pub fn magnitude_spectrum(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f32>() / n as f32;
    let mut bins: Vec<Complex<f32>> = signal
        .iter()
        .enumerate()
        .map(|(i, &x)| Complex::new((x - mean) * hann(i, n), 0.0))
        .collect();

    FftPlanner::new().plan_fft_forward(n).process(&mut bins);
    bins.iter().take(n / 2).map(|c| c.norm()).collect()
}

/// Spectral flatness (Wiener entropy) of a magnitude spectrum, in [0, 1].
///
/// Pure tones sit near 0, white noise near 1. The DC bin is ignored.
/// An empty or silent spectrum counts as perfectly flat.
pub fn spectral_flatness(magnitudes: &[f32]) -> f32 {
    let bins = magnitudes.get(1..).unwrap_or(&[]);
    if bins.is_empty() {
        return 1.0;
    }
    let power: Vec<f32> = bins.iter().map(|m| m * m + EPSILON).collect();
    let arithmetic = power.iter().sum::<f32>() / power.len() as f32;
    if arithmetic <= EPSILON * 2.0 {
        return 1.0;
    }
    let log_mean = power.iter().map(|p| p.ln()).sum::<f32>() / power.len() as f32;
    (log_mean.exp() / arithmetic).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn spectrum_peak_lands_on_tone_bin() {
        let sample_rate = 44_100.0;
        let len = 2048;
        let magnitudes = magnitude_spectrum(&sine(1000.0, sample_rate, len));
        assert_eq!(magnitudes.len(), len / 2);

        let peak_bin = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (1000.0 * len as f32 / sample_rate).round() as usize;
        assert!(peak_bin.abs_diff(expected) <= 1);
    }

    #[test]
    fn tone_is_less_flat_than_noise() {
        let tone = magnitude_spectrum(&sine(440.0, 44_100.0, 2048));

        // Deterministic pseudo-random noise
        let mut state = 0x1234_5678u32;
        let noise: Vec<f32> = (0..2048)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect();
        let noise = magnitude_spectrum(&noise);

        assert!(spectral_flatness(&tone) < 0.1);
        assert!(spectral_flatness(&noise) > 0.3);
    }

    #[test]
    fn empty_input_is_handled() {
        assert!(magnitude_spectrum(&[]).is_empty());
        assert_eq!(spectral_flatness(&[]), 1.0);
    }
}
