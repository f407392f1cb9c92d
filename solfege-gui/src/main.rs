//! # Solfège - Live Pitch Transcription GUI
//!
//! This module contains the main GUI application. It listens to the
//! microphone (or plays a WAV file), shows the sung note in solfège, and
//! writes what it hears onto a staff as an evolving score.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme; owns the score
//! - **Audio Thread**: One worker per session for capture/playback and analysis
//! - **Communication**: Crossbeam channels for thread-safe data exchange
//! - **Updates**: 60 FPS continuous updates via subscription system

mod ui;
mod worker;

use clap::Parser;
use crossbeam_channel::{Receiver, Sender};
use iced::{Element, Subscription, Task, Theme};
use solfege_core::config::Settings;
use solfege_core::notes::NoteNaming;
use solfege_core::score::Score;
use solfege_core::synth;
use solfege_core::transcriber::Transcriber;
use solfege_core::AnalysisFrame;
use std::collections::VecDeque;
use std::path::PathBuf;
use ui::main_display::create_main_view;
use worker::{AudioWorker, Source, WorkerEvent};

/// Number of frames averaged for the cents readout.
const SMOOTHING_FACTOR: usize = 5;

const SCORE_JSON_PATH: &str = "score.json";
const SCORE_LILYPOND_PATH: &str = "score.ly";
const SCORE_WAV_PATH: &str = "score.wav";

#[derive(Parser, Debug)]
#[command(name = "solfege", version, about = "Sing or play, and watch the notes appear")]
struct Args {
    /// WAV file offered by the "Play File" button
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Settings file; created when a setting is changed in the app
    #[arg(short, long, default_value = "solfege.json")]
    config: PathBuf,

    /// Score (JSON) to continue from
    #[arg(long)]
    score: Option<PathBuf>,
}

/// Main entry point for the Solfège application.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    log::info!("[MAIN] Starting Solfège application...");
    let result = iced::application("Solfège", SolfegeApp::update, SolfegeApp::view)
        .subscription(SolfegeApp::subscription)
        .theme(SolfegeApp::theme)
        .run_with(move || (SolfegeApp::new(args), Task::none()));
    log::info!("[MAIN] Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    // Sessions
    StartListening,
    PlayFile,
    PlayScore,
    Stop,

    // Score
    ClearScore,
    SaveScore,
    ExportLilyPond,
    ExportWav,

    // View
    ToggleNaming,
    ToggleReadout,
    ToggleSpectrum,
    ToggleStaff,

    /// Timer tick for real-time updates.
    Tick,
    /// The main window was closed.
    Exit,
}

/// What the current session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Microphone,
    File,
    Score,
}

impl SessionKind {
    /// Sessions whose frames are written into the score.
    pub fn transcribes(self) -> bool {
        self != SessionKind::Score
    }
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub status: String,
    pub session: Option<SessionKind>,
    pub input_file: Option<PathBuf>,
    pub sample_rate: Option<u32>,
    pub last_frame: Option<AnalysisFrame>,
    pub smoothing_buffer: VecDeque<f32>,
    pub naming: NoteNaming,

    pub readout_visible: bool,
    pub spectrum_visible: bool,
    pub staff_visible: bool,
}

impl AppDisplayData {
    /// Mean cents deviation over the last few pitched frames.
    pub fn smoothed_cents(&self) -> Option<f32> {
        if self.smoothing_buffer.is_empty() {
            return None;
        }
        Some(self.smoothing_buffer.iter().sum::<f32>() / self.smoothing_buffer.len() as f32)
    }
}

struct SolfegeApp {
    settings: Settings,
    config_path: PathBuf,

    worker: Option<AudioWorker>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,

    transcriber: Transcriber,
    display_data: AppDisplayData,
}

impl SolfegeApp {
    fn new(args: Args) -> Self {
        let settings = match Settings::load_or_default(&args.config) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("[MAIN] Could not load {}: {}; using defaults", args.config.display(), e);
                Settings::default()
            }
        };

        let transcriber = match args.score.as_ref().map(Score::load_json) {
            Some(Ok(score)) => {
                log::info!("[MAIN] Continuing score with {} events", score.len());
                Transcriber::with_score(&settings.transcription, score)
            }
            Some(Err(e)) => {
                log::error!("[MAIN] Could not load score: {}", e);
                Transcriber::new(&settings.transcription)
            }
            None => Transcriber::new(&settings.transcription),
        };

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let status = match &args.file {
            Some(path) => format!("Ready ({})", path.display()),
            None => "Ready".to_string(),
        };

        Self {
            display_data: AppDisplayData {
                status,
                session: None,
                input_file: args.file,
                sample_rate: None,
                last_frame: None,
                smoothing_buffer: VecDeque::with_capacity(SMOOTHING_FACTOR),
                naming: settings.naming,
                readout_visible: true,
                spectrum_visible: true,
                staff_visible: true,
            },
            settings,
            config_path: args.config,
            worker: None,
            events_tx,
            events_rx,
            transcriber,
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        if !matches!(message, Message::Tick) {
            log::debug!("[UPDATE] Received message: {:?}", message);
        }

        match message {
            Message::StartListening => self.start_session(Source::Microphone),
            Message::PlayFile => {
                if let Some(path) = self.display_data.input_file.clone() {
                    self.start_session(Source::File(path));
                }
            }
            Message::PlayScore => {
                if self.transcriber.score().note_count() > 0 {
                    self.start_session(Source::Rendered(self.transcriber.score().clone()));
                }
            }
            Message::Stop => {
                self.stop_session();
                self.display_data.status = "Stopped".to_string();
            }
            Message::ClearScore => {
                self.transcriber.reset();
                self.display_data.status = "Score cleared".to_string();
            }
            Message::SaveScore => {
                let result = self.transcriber.score().save_json(SCORE_JSON_PATH);
                self.report("Saved", SCORE_JSON_PATH, result);
            }
            Message::ExportLilyPond => {
                let result = self.transcriber.score().save_lilypond(SCORE_LILYPOND_PATH);
                self.report("Exported", SCORE_LILYPOND_PATH, result);
            }
            Message::ExportWav => {
                let result = synth::export_wav(
                    self.transcriber.score(),
                    &self.settings.synth,
                    self.settings.a4_hz,
                    SCORE_WAV_PATH,
                );
                self.report("Exported", SCORE_WAV_PATH, result);
            }
            Message::ToggleNaming => {
                self.settings.naming = self.settings.naming.toggled();
                self.display_data.naming = self.settings.naming;
                if let Err(e) = self.settings.save(&self.config_path) {
                    log::error!("[MAIN] Error saving settings: {}", e);
                }
            }
            Message::ToggleReadout => self.display_data.readout_visible = !self.display_data.readout_visible,
            Message::ToggleSpectrum => self.display_data.spectrum_visible = !self.display_data.spectrum_visible,
            Message::ToggleStaff => self.display_data.staff_visible = !self.display_data.staff_visible,
            Message::Tick => {
                self.drain_events();
                // Reap a worker whose source ran out.
                if self.display_data.session.is_none() && self.worker.as_ref().is_some_and(|w| !w.is_running()) {
                    if let Some(worker) = self.worker.take() {
                        worker.stop();
                    }
                }
            }
            Message::Exit => {
                log::info!("[MAIN] Window closed - shutting down audio worker...");
                self.stop_session();
                return iced::exit();
            }
        }
        Task::none()
    }

    fn report(&mut self, verb: &str, path: &str, result: solfege_core::Result<()>) {
        self.display_data.status = match result {
            Ok(()) => {
                log::info!("[MAIN] {} {}", verb, path);
                format!("{verb} {path}")
            }
            Err(e) => {
                log::error!("[MAIN] Error writing {}: {}", path, e);
                format!("Error: {e}")
            }
        };
    }

    fn start_session(&mut self, source: Source) {
        self.stop_session();

        let kind = match source {
            Source::Microphone => SessionKind::Microphone,
            Source::File(_) => SessionKind::File,
            Source::Rendered(_) => SessionKind::Score,
        };
        if source.transcribes() {
            self.transcriber.start_take();
        }

        self.display_data.status = source.label();
        self.display_data.session = Some(kind);
        self.display_data.last_frame = None;
        self.display_data.smoothing_buffer.clear();
        self.worker = Some(AudioWorker::spawn(source, self.settings.clone(), self.events_tx.clone()));
    }

    /// Stops the worker and flushes everything it produced into the score.
    fn stop_session(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            self.drain_events();
        }
        self.end_session(None);
    }

    fn end_session(&mut self, end: Option<f64>) {
        let Some(kind) = self.display_data.session.take() else {
            return;
        };
        if kind.transcribes() {
            let end = end.unwrap_or_else(|| self.transcriber.last_timestamp());
            let added = self.transcriber.finish(end);
            log::info!(
                "[MAIN] Session ended, {} new event(s), {} in score",
                added.len(),
                self.transcriber.score().len()
            );
        }
        self.display_data.smoothing_buffer.clear();
    }

    fn drain_events(&mut self) {
        let events: Vec<WorkerEvent> = self.events_rx.try_iter().collect();
        for event in events {
            self.process_event(event);
        }
    }

    fn process_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Started { sample_rate } => {
                self.display_data.sample_rate = Some(sample_rate);
            }
            WorkerEvent::Frame(frame) => {
                if self.display_data.session.is_some_and(SessionKind::transcribes) {
                    for event in self.transcriber.push(&frame) {
                        log::debug!("[MAIN] + {}", event.describe(self.display_data.naming));
                    }
                }

                match frame.cents_deviation {
                    Some(cents) => {
                        self.display_data.smoothing_buffer.push_back(cents);
                        if self.display_data.smoothing_buffer.len() > SMOOTHING_FACTOR {
                            self.display_data.smoothing_buffer.pop_front();
                        }
                    }
                    None => self.display_data.smoothing_buffer.clear(),
                }
                self.display_data.last_frame = Some(frame);
            }
            WorkerEvent::Finished { end } => {
                self.end_session(Some(end));
                self.display_data.status = "Finished".to_string();
            }
            WorkerEvent::Failed(e) => {
                self.end_session(None);
                self.display_data.status = format!("Error: {e}");
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data, self.transcriber.score())
    }

    /// Timer subscription at ~60 FPS plus the window close event.
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick),
            iced::window::close_events().map(|_| Message::Exit),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
