//! Offline transcription of a WAV file.
//!
//! Runs the same analysis and transcription pipeline as the GUI over a whole
//! file and prints the resulting notes, optionally writing the score as JSON,
//! LilyPond, or a re-synthesized WAV.

use anyhow::{bail, Context, Result};
use clap::Parser;
use solfege_core::analysis::transcribe_samples;
use solfege_core::audio;
use solfege_core::config::Settings;
use solfege_core::notes::NoteNaming;
use solfege_core::synth;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "transcribe", version, about = "Transcribe a WAV recording into notes")]
struct Args {
    /// Input WAV file
    input: PathBuf,

    /// Settings file (defaults are used if it does not exist)
    #[arg(short, long, value_name = "FILE", default_value = "solfege.json")]
    config: PathBuf,

    /// Tempo in beats per minute, overriding the settings
    #[arg(short, long, value_name = "BPM")]
    tempo: Option<f32>,

    /// Print letter names (C D E) instead of solfège
    #[arg(long)]
    letters: bool,

    /// Write the score as JSON
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Write the score as a LilyPond file
    #[arg(long, value_name = "FILE")]
    lilypond: Option<PathBuf>,

    /// Render the score back to audio
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut settings = Settings::load_or_default(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?;
    if let Some(tempo) = args.tempo {
        settings.transcription.tempo_bpm = tempo;
    }
    if args.letters {
        settings.naming = NoteNaming::Letter;
    }
    settings.validate().context("invalid settings")?;

    let decoded = audio::load_wav(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    if decoded.samples.is_empty() {
        bail!("{} contains no audio", args.input.display());
    }

    let score = transcribe_samples(&decoded.samples, decoded.sample_rate, &settings)
        .context("transcription failed")?;

    println!(
        "{}: {:.2}s, {} notes at {} bpm",
        args.input.display(),
        decoded.duration_secs(),
        score.note_count(),
        score.tempo_bpm
    );
    for (i, measure) in score.measures().iter().enumerate() {
        let events: Vec<String> = measure.events.iter().map(|e| e.describe(settings.naming)).collect();
        println!("{:>3} | {}", i + 1, events.join(", "));
    }

    if let Some(path) = &args.json {
        score.save_json(path).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.lilypond {
        score.save_lilypond(path).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.render {
        synth::export_wav(&score, &settings.synth, settings.a4_hz, path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
