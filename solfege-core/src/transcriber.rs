//! # Transcriber Module
//!
//! Turns analysis frames into score events in batches:
//! 1. Each frame's gated pitch feeds the onset segmenter
//! 2. Closed segments queue up until `batch_size` of them are waiting
//! 3. The batch is quantized into note values and appended to the score
//!
//! Batching keeps the score from flickering while a note is still being
//! decided, at the cost of a short delay before notes appear.

use crate::AnalysisFrame;
use crate::config::TranscriptionSettings;
use crate::duration::{self, NoteDuration};
use crate::score::{Score, ScoreEvent};
use crate::segment::{NoteSegment, Segmenter};

#[derive(Debug, Clone)]
pub struct Transcriber {
    segmenter: Segmenter,
    batch_size: usize,
    pending: Vec<NoteSegment>,
    score: Score,
    last_timestamp: f64,
    /// Whether the current take has produced a note yet.
    take_has_note: bool,
    /// Quantized rests waiting for a following note before they enter the score.
    held_rests: Vec<NoteDuration>,
}

impl Transcriber {
    pub fn new(settings: &TranscriptionSettings) -> Self {
        Self {
            segmenter: Segmenter::new(settings.min_note_frames),
            batch_size: settings.batch_size.max(1),
            pending: Vec::new(),
            score: Score::new(settings.tempo_bpm, settings.time_signature),
            last_timestamp: 0.0,
            take_has_note: false,
            held_rests: Vec::new(),
        }
    }

    /// Continues an existing score, e.g. one loaded from disk.
    ///
    /// The score keeps its own tempo and time signature.
    pub fn with_score(settings: &TranscriptionSettings, score: Score) -> Self {
        Self { score, ..Self::new(settings) }
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn into_score(self) -> Score {
        self.score
    }

    /// Segments closed but not yet quantized.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Time of the most recent frame.
    pub fn last_timestamp(&self) -> f64 {
        self.last_timestamp
    }

    /// Feeds one analysis frame; returns any events appended to the score.
    pub fn push(&mut self, frame: &AnalysisFrame) -> Vec<ScoreEvent> {
        self.last_timestamp = frame.timestamp;
        if let Some(segment) = self.segmenter.push(frame.pitch, frame.frequency, frame.timestamp) {
            log::debug!(
                "[TRANSCRIBE] Segment {:?} {:.3}s-{:.3}s",
                segment.pitch, segment.start, segment.end
            );
            self.pending.push(segment);
        }
        if self.pending.len() >= self.batch_size {
            self.flush_batch()
        } else {
            Vec::new()
        }
    }

    /// Closes the open segment at `end` and flushes everything pending.
    ///
    /// Rests not followed by a note are dropped: silence after the last note
    /// is not music.
    pub fn finish(&mut self, end: f64) -> Vec<ScoreEvent> {
        if let Some(segment) = self.segmenter.flush(end) {
            self.pending.push(segment);
        }
        let appended = self.flush_batch();
        if !self.held_rests.is_empty() {
            log::trace!("[TRANSCRIBE] Dropped {} trailing rest(s)", self.held_rests.len());
            self.held_rests.clear();
        }
        appended
    }

    /// Starts a new take whose timestamps restart at zero.
    ///
    /// The score is kept and new events are appended after it; anything still
    /// pending from the previous take should be flushed with [`finish`] first.
    ///
    /// [`finish`]: Transcriber::finish
    pub fn start_take(&mut self) {
        self.segmenter.reset();
        self.pending.clear();
        self.held_rests.clear();
        self.last_timestamp = 0.0;
        self.take_has_note = false;
    }

    /// Clears the score and all segmentation state.
    pub fn reset(&mut self) {
        self.segmenter.reset();
        self.pending.clear();
        self.held_rests.clear();
        self.score.clear();
        self.last_timestamp = 0.0;
        self.take_has_note = false;
    }

    fn flush_batch(&mut self) -> Vec<ScoreEvent> {
        let tempo = self.score.tempo_bpm;
        let mut appended = Vec::new();

        for segment in self.pending.drain(..) {
            // Silence before the first note of a take is not part of the score.
            if segment.is_rest() && !self.take_has_note {
                continue;
            }

            let pieces = duration::split(segment.duration(), tempo);
            if pieces.is_empty() {
                log::trace!("[TRANSCRIBE] Dropped {:.3}s segment as too short", segment.duration());
                continue;
            }

            let Some(pitch) = segment.pitch else {
                // A rest only enters the score once a note follows it.
                self.held_rests.extend(pieces);
                continue;
            };

            self.take_has_note = true;
            appended.extend(self.held_rests.drain(..).map(|duration| ScoreEvent::Rest { duration }));
            let last = pieces.len() - 1;
            appended.extend(
                pieces
                    .into_iter()
                    .enumerate()
                    .map(|(i, duration)| ScoreEvent::Note { pitch, duration, tied: i < last }),
            );
        }

        if !appended.is_empty() {
            log::debug!("[TRANSCRIBE] Appended {} event(s)", appended.len());
            self.score.extend(appended.iter().copied());
        }
        appended
    }
}
