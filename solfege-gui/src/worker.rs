//! # Audio Worker
//!
//! One dedicated thread per session. It owns the cpal stream (capture or
//! playback), cuts the incoming samples into frames and sends every
//! [`AnalysisFrame`] back to the GUI thread.
//!
//! ## Architecture
//! - **cpal callback**: pushes raw mono chunks into a bounded channel
//! - **Worker thread**: `select!` over raw chunks and the shutdown signal
//! - **GUI thread**: drains [`WorkerEvent`]s on every tick

use crossbeam_channel::{Receiver, Sender};
use cpal::traits::StreamTrait;
use solfege_core::analysis::Analyzer;
use solfege_core::audio::{self, Framer, Playback};
use solfege_core::config::Settings;
use solfege_core::score::Score;
use solfege_core::synth;
use solfege_core::{AnalysisFrame, Result, SolfegeError};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

/// Raw chunks buffered between the audio callback and the worker.
const RAW_CHANNEL_CAPACITY: usize = 256;

/// Where the worker's audio comes from.
#[derive(Debug, Clone)]
pub enum Source {
    Microphone,
    /// A WAV file, played back and analysed as it plays.
    File(PathBuf),
    /// The current score, synthesized; analysed for display only.
    Rendered(Score),
}

impl Source {
    pub fn label(&self) -> String {
        match self {
            Source::Microphone => "Listening".to_string(),
            Source::File(path) => format!("Playing {}", path.display()),
            Source::Rendered(_) => "Playing score".to_string(),
        }
    }

    /// Whether frames from this source belong in the score.
    pub fn transcribes(&self) -> bool {
        !matches!(self, Source::Rendered(_))
    }
}

/// Messages from the worker thread to the GUI.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started { sample_rate: u32 },
    Frame(AnalysisFrame),
    /// The source ran out (end of file or score). `end` is in seconds.
    Finished { end: f64 },
    Failed(String),
}

/// Keeps whichever stream the session opened alive.
enum ActiveStream {
    Capture(cpal::Stream),
    Playback(Playback),
}

impl ActiveStream {
    fn stop(self) {
        match self {
            ActiveStream::Capture(stream) => {
                if let Err(e) = stream.pause() {
                    log::warn!("[WORKER] Error pausing capture stream: {}", e);
                }
            }
            ActiveStream::Playback(playback) => playback.stop(),
        }
    }
}

/// Handle to a running worker thread.
#[derive(Debug)]
pub struct AudioWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioWorker {
    pub fn spawn(source: Source, settings: Settings, events: Sender<WorkerEvent>) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let thread_handle = thread::spawn(move || {
            log::info!("[WORKER] Starting: {}", source.label());
            if let Err(e) = run(source, &settings, &events, &shutdown_rx) {
                log::error!("[WORKER] {}", e);
                let _ = events.send(WorkerEvent::Failed(e.to_string()));
            }
            log::info!("[WORKER] Audio thread finished");
        });
        Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        }
    }

    /// Signals the thread to stop and waits for it.
    pub fn stop(mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[WORKER] Audio thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

fn open(source: Source, settings: &Settings, raw_tx: Sender<Vec<f32>>) -> Result<(ActiveStream, u32)> {
    match source {
        Source::Microphone => {
            let (stream, sample_rate) = audio::start_audio_capture(raw_tx)?;
            Ok((ActiveStream::Capture(stream), sample_rate))
        }
        Source::File(path) => {
            let decoded = audio::load_wav(&path)?;
            if decoded.samples.is_empty() {
                return Err(SolfegeError::InvalidAudio(format!("{} holds no samples", path.display())));
            }
            let playback = audio::start_playback(decoded.samples, decoded.sample_rate, Some(raw_tx))?;
            let rate = playback.sample_rate();
            Ok((ActiveStream::Playback(playback), rate))
        }
        Source::Rendered(score) => {
            let playback = synth::play_score(&score, &settings.synth, settings.a4_hz, Some(raw_tx))?;
            let rate = playback.sample_rate();
            Ok((ActiveStream::Playback(playback), rate))
        }
    }
}

fn run(
    source: Source,
    settings: &Settings,
    events: &Sender<WorkerEvent>,
    shutdown_rx: &Receiver<()>,
) -> Result<()> {
    let mut analyzer = Analyzer::new(settings)?;
    let mut framer = Framer::new(settings.window.hop_size, analyzer.max_window_size());

    let (raw_tx, raw_rx) = crossbeam_channel::bounded::<Vec<f32>>(RAW_CHANNEL_CAPACITY);
    let (stream, sample_rate) = open(source, settings, raw_tx)?;
    let _ = events.send(WorkerEvent::Started { sample_rate });

    'session: loop {
        crossbeam_channel::select! {
            recv(raw_rx) -> msg => match msg {
                Ok(chunk) => {
                    framer.push(&chunk);
                    while let Some(frame) = framer.next_frame(analyzer.window_size()) {
                        let timestamp = frame.timestamp(sample_rate);
                        let result = analyzer.analyze(&frame.samples, sample_rate, timestamp);
                        if events.send(WorkerEvent::Frame(result)).is_err() {
                            log::warn!("[WORKER] GUI receiver dropped");
                            break 'session;
                        }
                    }
                }
                Err(_) => {
                    // The playback tap is dropped after the last sample.
                    let end = framer.total_samples() as f64 / sample_rate as f64;
                    log::info!("[WORKER] Source finished after {:.2}s", end);
                    let _ = events.send(WorkerEvent::Finished { end });
                    break;
                }
            },
            recv(shutdown_rx) -> _ => {
                log::info!("[WORKER] Received shutdown signal");
                break;
            },
        }
    }

    stream.stop();
    Ok(())
}
