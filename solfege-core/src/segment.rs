//! # Onset Segmentation Module
//!
//! Splits a stream of per-frame pitches into note and rest segments with a
//! single linear scan. A segment ends when a different observation (another
//! pitch, or no pitch at all) has persisted for `min_frames` consecutive
//! frames; shorter excursions are treated as glitches and absorbed.

use crate::notes::Pitch;

/// A stretch of time holding one pitch, or silence when `pitch` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSegment {
    pub pitch: Option<Pitch>,
    /// Onset in seconds from the start of the session.
    pub start: f64,
    /// Offset in seconds.
    pub end: f64,
    /// Median detected frequency over the segment's frames, for notes.
    pub median_frequency: Option<f32>,
}

impl NoteSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }
}

#[derive(Debug, Clone)]
struct OpenSegment {
    pitch: Option<Pitch>,
    start: f64,
    frequencies: Vec<f32>,
}

#[derive(Debug, Clone)]
struct Candidate {
    pitch: Option<Pitch>,
    start: f64,
    count: usize,
    frequencies: Vec<f32>,
}

/// Streaming pitch-change segmenter.
#[derive(Debug, Clone)]
pub struct Segmenter {
    min_frames: usize,
    open: Option<OpenSegment>,
    candidate: Option<Candidate>,
}

impl Segmenter {
    /// `min_frames` is clamped to at least 1 (every change is accepted at once).
    pub fn new(min_frames: usize) -> Self {
        Self {
            min_frames: min_frames.max(1),
            open: None,
            candidate: None,
        }
    }

    /// Feeds one frame. Returns the segment closed by this frame, if any.
    pub fn push(&mut self, pitch: Option<Pitch>, frequency: Option<f32>, timestamp: f64) -> Option<NoteSegment> {
        let Some(open) = self.open.as_mut() else {
            self.open = Some(OpenSegment {
                pitch,
                start: timestamp,
                frequencies: frequency.into_iter().collect(),
            });
            return None;
        };

        if open.pitch == pitch {
            // Any excursion shorter than min_frames is folded back in.
            if let Some(glitch) = self.candidate.take() {
                log::trace!("[SEGMENT] Ignored {}-frame glitch at {:.3}s", glitch.count, glitch.start);
            }
            open.frequencies.extend(frequency);
            return None;
        }

        match self.candidate.as_mut() {
            Some(candidate) if candidate.pitch == pitch => {
                candidate.count += 1;
                candidate.frequencies.extend(frequency);
            }
            _ => {
                self.candidate = Some(Candidate {
                    pitch,
                    start: timestamp,
                    count: 1,
                    frequencies: frequency.into_iter().collect(),
                });
            }
        }

        let confirmed = self
            .candidate
            .as_ref()
            .is_some_and(|candidate| candidate.count >= self.min_frames);
        if !confirmed {
            return None;
        }

        let candidate = self.candidate.take()?;
        let closed = self.open.replace(OpenSegment {
            pitch: candidate.pitch,
            start: candidate.start,
            frequencies: candidate.frequencies,
        })?;
        Some(close(closed, candidate.start))
    }

    /// Closes the open segment at `end`, e.g. when the source stops.
    pub fn flush(&mut self, end: f64) -> Option<NoteSegment> {
        self.candidate = None;
        self.open.take().map(|open| close(open, end))
    }

    pub fn reset(&mut self) {
        self.open = None;
        self.candidate = None;
    }
}

fn close(open: OpenSegment, end: f64) -> NoteSegment {
    NoteSegment {
        pitch: open.pitch,
        start: open.start,
        end: end.max(open.start),
        median_frequency: open.pitch.and(median(open.frequencies)),
    }
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Segments a complete sequence of `(pitch, frequency, timestamp)` frames.
pub fn segment_all<I>(frames: I, min_frames: usize, end: f64) -> Vec<NoteSegment>
where
    I: IntoIterator<Item = (Option<Pitch>, Option<f32>, f64)>,
{
    let mut segmenter = Segmenter::new(min_frames);
    let mut segments: Vec<NoteSegment> = frames
        .into_iter()
        .filter_map(|(pitch, frequency, t)| segmenter.push(pitch, frequency, t))
        .collect();
    segments.extend(segmenter.flush(end));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(midi: u8) -> Option<Pitch> {
        Pitch::from_midi(midi)
    }

    /// Frames every 10 ms.
    fn frames(pitches: &[Option<Pitch>]) -> Vec<(Option<Pitch>, Option<f32>, f64)> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &pitch)| (pitch, pitch.map(|p| p.frequency(440.0)), i as f64 * 0.01))
            .collect()
    }

    #[test]
    fn splits_on_sustained_pitch_change() {
        let mut seq = vec![p(60); 10];
        seq.extend(vec![p(62); 10]);
        let segments = segment_all(frames(&seq), 3, 0.2);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].pitch, p(60));
        assert!((segments[0].start - 0.0).abs() < 1e-9);
        assert!((segments[0].end - 0.10).abs() < 1e-9);
        assert_eq!(segments[1].pitch, p(62));
        assert!((segments[1].start - 0.10).abs() < 1e-9);
        assert!((segments[1].end - 0.2).abs() < 1e-9);
    }

    #[test]
    fn short_glitches_are_absorbed() {
        let mut seq = vec![p(60); 5];
        seq.extend(vec![p(72); 2]); // octave jump for two frames
        seq.extend(vec![None; 1]);
        seq.extend(vec![p(60); 5]);
        let segments = segment_all(frames(&seq), 3, 0.13);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].pitch, p(60));
        assert!((segments[0].duration() - 0.13).abs() < 1e-9);
    }

    #[test]
    fn silence_becomes_rest() {
        let mut seq = vec![p(67); 4];
        seq.extend(vec![None; 4]);
        seq.extend(vec![p(67); 4]);
        let segments = segment_all(frames(&seq), 2, 0.12);

        let kinds: Vec<bool> = segments.iter().map(NoteSegment::is_rest).collect();
        assert_eq!(kinds, vec![false, true, false]);
        assert!(segments[1].median_frequency.is_none());
    }

    #[test]
    fn median_frequency_tracks_the_note() {
        let mut segmenter = Segmenter::new(1);
        for (i, freq) in [440.0, 441.0, 439.0, 442.0, 438.0].into_iter().enumerate() {
            assert!(segmenter.push(p(69), Some(freq), i as f64 * 0.01).is_none());
        }
        let segment = segmenter.flush(0.05).unwrap();
        assert_eq!(segment.median_frequency, Some(440.0));
    }

    #[test]
    fn flush_on_empty_is_none() {
        let mut segmenter = Segmenter::new(3);
        assert!(segmenter.flush(1.0).is_none());
    }
}
