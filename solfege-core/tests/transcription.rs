use solfege_core::analysis::{analyze_samples, transcribe_samples};
use solfege_core::audio;
use solfege_core::config::Settings;
use solfege_core::duration::{NoteDuration, NoteValue};
use solfege_core::notes::{NoteNaming, Pitch};
use solfege_core::score::{Score, ScoreEvent, TimeSignature};
use solfege_core::synth;
use solfege_core::transcriber::Transcriber;

const SR: u32 = 44_100;

fn settings_at(tempo: f32) -> Settings {
    let mut settings = Settings::default();
    settings.transcription.tempo_bpm = tempo;
    settings
}

/// Pure tones (or silence for `None`) back to back, with short fades so the
/// joins do not click.
fn melody(parts: &[(Option<u8>, f32)]) -> Vec<f32> {
    let mut out = Vec::new();
    for &(midi, secs) in parts {
        let len = (secs * SR as f32) as usize;
        let fade = (0.005 * SR as f32) as usize;
        match midi.and_then(Pitch::from_midi) {
            Some(pitch) => {
                let freq = pitch.frequency(440.0);
                out.extend((0..len).map(|i| {
                    let gain = (i.min(len - i) as f32 / fade as f32).min(1.0);
                    0.5 * gain * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin()
                }));
            }
            None => out.extend(std::iter::repeat(0.0).take(len)),
        }
    }
    out
}

fn notes_of(score: &Score) -> Vec<(u8, NoteDuration)> {
    score
        .events()
        .iter()
        .filter_map(|e| e.pitch().map(|p| (p.midi(), e.duration())))
        .collect()
}

#[test]
fn transcribes_a_scale_fragment() {
    // Do Ré Mi Fa at 60 bpm: quarter, quarter, half, quarter.
    let samples = melody(&[(Some(60), 1.0), (Some(62), 1.0), (Some(64), 2.0), (Some(65), 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings_at(60.0)).unwrap();

    let quarter = NoteDuration::plain(NoteValue::Quarter);
    let half = NoteDuration::plain(NoteValue::Half);
    assert_eq!(notes_of(&score), vec![(60, quarter), (62, quarter), (64, half), (65, quarter)]);

    let names: Vec<String> = score.events().iter().map(|e| e.describe(NoteNaming::Solfege)).collect();
    assert_eq!(names, vec!["Do4 quarter", "Ré4 quarter", "Mi4 half", "Fa4 quarter"]);
}

#[test]
fn silence_between_notes_becomes_a_rest() {
    let samples = melody(&[
        (None, 0.4),
        (Some(69), 1.0),
        (None, 1.0),
        (Some(67), 1.0),
        (None, 0.7),
    ]);
    let score = transcribe_samples(&samples, SR, &settings_at(60.0)).unwrap();

    let events = score.events();
    assert_eq!(events.len(), 3, "{events:?}");
    assert_eq!(events[0].pitch().map(Pitch::midi), Some(69));
    assert!(matches!(events[1], ScoreEvent::Rest { .. }));
    assert_eq!(events[2].pitch().map(Pitch::midi), Some(67));
}

fn described(score: &Score) -> Vec<String> {
    score.events().iter().map(|e| e.describe(NoteNaming::Solfege)).collect()
}

#[test]
fn blip_before_the_first_note_is_ignored() {
    let samples = melody(&[(None, 0.5), (Some(76), 0.08), (None, 0.5), (Some(69), 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings_at(60.0)).unwrap();
    assert_eq!(described(&score), vec!["La4 quarter"]);
}

#[test]
fn blip_after_the_last_note_leaves_no_trailing_rest() {
    let samples = melody(&[(Some(69), 1.0), (None, 1.0), (Some(76), 0.08), (None, 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings_at(60.0)).unwrap();
    assert_eq!(described(&score), vec!["La4 quarter"]);
}

#[test]
fn rest_closed_mid_take_waits_for_a_note() {
    let mut settings = settings_at(60.0);
    settings.transcription.batch_size = 1;

    // The blip closes the rest long before the take ends.
    let samples = melody(&[(Some(69), 1.0), (None, 1.0), (Some(76), 0.08), (None, 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings).unwrap();
    assert_eq!(described(&score), vec!["La4 quarter"]);

    let samples = melody(&[(Some(69), 1.0), (None, 1.0), (Some(67), 1.0), (None, 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings).unwrap();
    assert_eq!(described(&score), vec!["La4 quarter", "rest quarter", "Sol4 quarter"]);
}

#[test]
fn loaded_score_continues_at_its_own_tempo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("score.json");
    let first = transcribe_samples(&melody(&[(Some(60), 1.0)]), SR, &settings_at(60.0)).unwrap();
    first.save_json(&path).unwrap();

    let settings = settings_at(120.0);
    let mut transcriber = Transcriber::with_score(&settings.transcription, Score::load_json(&path).unwrap());
    transcriber.start_take();
    let samples = melody(&[(Some(62), 1.0)]);
    for frame in analyze_samples(&samples, SR, &settings).unwrap() {
        transcriber.push(&frame);
    }
    transcriber.finish(samples.len() as f64 / SR as f64);

    // One second is a quarter at the saved 60 bpm, not a half at 120.
    let score = transcriber.into_score();
    assert_eq!(score.tempo_bpm, 60.0);
    assert_eq!(described(&score), vec!["Do4 quarter", "Ré4 quarter"]);
}

#[test]
fn silent_recording_gives_an_empty_score() {
    let score = transcribe_samples(&vec![0.0; SR as usize], SR, &Settings::default()).unwrap();
    assert!(score.is_empty());
}

#[test]
fn synthesized_score_transcribes_back() {
    let mut original = Score::new(90.0, TimeSignature::COMMON);
    for (midi, value) in [(67, NoteValue::Quarter), (69, NoteValue::Quarter), (71, NoteValue::Half)] {
        original.push(ScoreEvent::Note {
            pitch: Pitch::from_midi(midi).unwrap(),
            duration: NoteDuration::plain(value),
            tied: false,
        });
    }

    let settings = settings_at(90.0);
    let samples = synth::render_score(&original, &settings.synth, settings.a4_hz);
    let score = transcribe_samples(&samples, settings.synth.sample_rate, &settings).unwrap();

    let pitches: Vec<u8> = notes_of(&score).into_iter().map(|(midi, _)| midi).collect();
    assert_eq!(pitches, vec![67, 69, 71]);
}

#[test]
fn wav_file_round_trip_through_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    audio::write_wav(&path, &melody(&[(Some(57), 0.5)]), SR).unwrap();

    let decoded = audio::load_wav(&path).unwrap();
    let frames = analyze_samples(&decoded.samples, decoded.sample_rate, &Settings::default()).unwrap();
    let pitched = frames.iter().filter(|f| f.pitch.map(Pitch::midi) == Some(57)).count();
    assert!(pitched * 2 > frames.len(), "{pitched} of {} frames pitched", frames.len());
}

#[test]
fn lilypond_export_of_a_transcription() {
    let samples = melody(&[(Some(72), 1.0), (Some(74), 1.0)]);
    let score = transcribe_samples(&samples, SR, &settings_at(60.0)).unwrap();
    let ly = score.to_lilypond();
    assert!(ly.contains("c''4"), "{ly}");
    assert!(ly.contains("d''4"), "{ly}");
}
