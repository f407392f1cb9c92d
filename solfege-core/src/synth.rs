//! # Synth Module
//!
//! Renders a [`Score`] back to audio so the transcription can be heard.
//!
//! ## Features
//! - Additive tone: harmonic `k` at amplitude `1/k`, normalized to `volume`
//! - Linear attack and release per note
//! - Tied notes sound as one continuous note (no re-attack, phase kept)
//! - Rests are silence
//!
//! Event boundaries are computed from cumulative beats so long scores do not
//! drift against the tempo.

use std::f32::consts::TAU;
use std::path::Path;

use crossbeam_channel::Sender;

use crate::audio::{self, Playback};
use crate::config::SynthSettings;
use crate::error::Result;
use crate::notes::Pitch;
use crate::score::{Score, ScoreEvent};

/// A stretch of output with one pitch; tied notes are merged into one span.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    pitch: Option<Pitch>,
    start: usize,
    end: usize,
}

fn spans(score: &Score, sample_rate: u32) -> Vec<Span> {
    let samples_per_beat = 60.0 / score.tempo_bpm as f64 * sample_rate as f64;
    let mut spans: Vec<Span> = Vec::new();
    let mut beats = 0.0;
    let mut tie_open = false;

    for event in score.events() {
        let start = (beats * samples_per_beat).round() as usize;
        beats += event.beats();
        let end = (beats * samples_per_beat).round() as usize;
        let pitch = event.pitch();

        match spans.last_mut() {
            Some(last) if tie_open && last.pitch == pitch => last.end = end,
            _ => spans.push(Span { pitch, start, end }),
        }
        tie_open = matches!(event, ScoreEvent::Note { tied: true, .. });
    }
    spans
}

fn envelope(i: usize, len: usize, attack: usize, release: usize) -> f32 {
    let attack = attack.min(len / 2);
    let release = release.min(len / 2);
    let mut gain = 1.0;
    if attack > 0 && i < attack {
        gain = i as f32 / attack as f32;
    }
    let from_end = len - i;
    if release > 0 && from_end <= release {
        gain = gain.min(from_end as f32 / release as f32);
    }
    gain
}

/// Renders the score to mono samples at `settings.sample_rate`.
pub fn render_score(score: &Score, settings: &SynthSettings, a4_hz: f32) -> Vec<f32> {
    let sample_rate = settings.sample_rate.max(1);
    if score.is_empty() || !(score.tempo_bpm > 0.0) {
        return Vec::new();
    }

    let spans = spans(score, sample_rate);
    let total = spans.last().map_or(0, |s| s.end);
    let mut out = vec![0.0f32; total];

    let harmonics = settings.harmonics.max(1);
    let norm: f32 = (1..=harmonics).map(|k| 1.0 / k as f32).sum();
    let attack = (settings.attack_secs * sample_rate as f32) as usize;
    let release = (settings.release_secs * sample_rate as f32) as usize;
    let nyquist = sample_rate as f32 / 2.0;

    for span in &spans {
        let Some(pitch) = span.pitch else { continue };
        let freq = pitch.frequency(a4_hz);
        let len = span.end - span.start;
        log::trace!("[SYNTH] {} for {} samples", pitch, len);

        for (i, sample) in out[span.start..span.end].iter_mut().enumerate() {
            let t = i as f32 / sample_rate as f32;
            let tone: f32 = (1..=harmonics)
                .filter(|&k| freq * (k as f32) < nyquist)
                .map(|k| (TAU * freq * k as f32 * t).sin() / k as f32)
                .sum();
            *sample = settings.volume * envelope(i, len, attack, release) * tone / norm;
        }
    }

    log::debug!(
        "[SYNTH] Rendered {} events into {:.2}s of audio",
        score.len(),
        total as f64 / sample_rate as f64
    );
    out
}

/// Renders the score and writes it as a 16-bit WAV file.
pub fn export_wav(score: &Score, settings: &SynthSettings, a4_hz: f32, path: impl AsRef<Path>) -> Result<()> {
    let samples = render_score(score, settings, a4_hz);
    audio::write_wav(path, &samples, settings.sample_rate)
}

/// Renders the score and starts playing it on the default output device.
pub fn play_score(
    score: &Score,
    settings: &SynthSettings,
    a4_hz: f32,
    tap: Option<Sender<Vec<f32>>>,
) -> Result<Playback> {
    let samples = render_score(score, settings, a4_hz);
    audio::start_playback(samples, settings.sample_rate, tap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{NoteDuration, NoteValue};
    use crate::score::TimeSignature;
    use approx::assert_relative_eq;

    fn note(midi: u8, value: NoteValue, tied: bool) -> ScoreEvent {
        ScoreEvent::Note {
            pitch: Pitch::from_midi(midi).unwrap(),
            duration: NoteDuration::plain(value),
            tied,
        }
    }

    fn score(events: &[ScoreEvent]) -> Score {
        let mut score = Score::new(60.0, TimeSignature::COMMON);
        score.extend(events.iter().copied());
        score
    }

    fn settings() -> SynthSettings {
        SynthSettings { sample_rate: 8_000, ..SynthSettings::default() }
    }

    #[test]
    fn empty_score_renders_nothing() {
        assert!(render_score(&score(&[]), &settings(), 440.0).is_empty());
    }

    #[test]
    fn length_follows_tempo() {
        let s = score(&[note(69, NoteValue::Quarter, false), note(71, NoteValue::Half, false)]);
        assert_eq!(render_score(&s, &settings(), 440.0).len(), 3 * 8_000);
    }

    #[test]
    fn peak_stays_within_volume() {
        let s = score(&[note(57, NoteValue::Half, false)]);
        let out = render_score(&s, &settings(), 440.0);
        let peak = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak <= settings().volume + 1e-4);
        assert!(peak > settings().volume * 0.5);
        assert_relative_eq!(out[0], 0.0);
    }

    #[test]
    fn rests_are_silent() {
        let s = score(&[
            note(69, NoteValue::Quarter, false),
            ScoreEvent::Rest { duration: NoteDuration::plain(NoteValue::Quarter) },
            note(69, NoteValue::Quarter, false),
        ]);
        let out = render_score(&s, &settings(), 440.0);
        assert!(out[8_000..16_000].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn tied_notes_do_not_retrigger() {
        let tied = score(&[note(69, NoteValue::Quarter, true), note(69, NoteValue::Quarter, false)]);
        let single = score(&[note(69, NoteValue::Half, false)]);
        let a = render_score(&tied, &settings(), 440.0);
        let b = render_score(&single, &settings(), 440.0);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn untied_repeats_are_re_attacked() {
        let s = score(&[note(69, NoteValue::Quarter, false), note(69, NoteValue::Quarter, false)]);
        let out = render_score(&s, &settings(), 440.0);
        assert_relative_eq!(out[8_000], 0.0);
    }

    #[test]
    fn partials_above_nyquist_are_skipped() {
        // C9 is about 8.4 kHz, above the 4 kHz Nyquist limit at 8 kHz.
        let s = score(&[note(120, NoteValue::Quarter, false)]);
        let out = render_score(&s, &settings(), 440.0);
        assert_eq!(out.len(), 8_000);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn exports_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("score.wav");
        let s = score(&[note(60, NoteValue::Quarter, false)]);
        export_wav(&s, &settings(), 440.0, &path).unwrap();
        let decoded = audio::load_wav(&path).unwrap();
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.samples.len(), 8_000);
    }
}
