//! # Audio I/O Module
//!
//! This module handles real-time audio capture and playback using CPAL
//! (Cross-Platform Audio Library), WAV decoding with hound, and the framing
//! that turns an arbitrary stream of samples into overlapping analysis frames.
//!
//! ## Features
//! - Default input device capture, downmixed to mono
//! - File and synthesized playback on the default output device, with an
//!   optional tap that feeds the played samples back into analysis
//! - Linear resampling when the device cannot run at the source rate
//! - Hop-based framing with a window length that may change between frames

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{device_err, Result, SolfegeError};

/// Preferred capture sample rate.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Decoded mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Averages interleaved channels into a mono signal.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Reads a WAV file into mono f32 samples in [-1, 1].
///
/// Integer formats are scaled by their bit depth; multi-channel files are
/// averaged to mono.
pub fn load_wav(path: impl AsRef<Path>) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(SolfegeError::InvalidAudio(format!("{} has an invalid header", path.display())));
    }

    let samples = downmix(&interleaved, spec.channels as usize);
    log::info!(
        "[AUDIO] Loaded {}: {} Hz, {} channel(s), {:.2} s",
        path.display(),
        spec.sample_rate,
        spec.channels,
        samples.len() as f64 / spec.sample_rate as f64
    );
    Ok(DecodedAudio { samples, sample_rate: spec.sample_rate })
}

/// Writes mono samples as a 16-bit PCM WAV file.
pub fn write_wav(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Linear-interpolation resampler. Good enough for monitoring playback.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

/// An analysis frame cut from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub samples: Vec<f32>,
    /// Absolute index (in samples) one past the last sample of the frame.
    pub end_sample: u64,
}

impl Frame {
    /// Time at which the frame became complete.
    pub fn timestamp(&self, sample_rate: u32) -> f64 {
        self.end_sample as f64 / sample_rate.max(1) as f64
    }
}

/// Cuts overlapping frames out of a sample stream.
///
/// A frame is produced every `hop` samples. Its length is chosen by the caller
/// per frame, up to `max_window`; the framer keeps just enough history for that.
#[derive(Debug, Clone)]
pub struct Framer {
    hop: usize,
    max_window: usize,
    history: VecDeque<f32>,
    /// Absolute index of `history[0]`.
    offset: u64,
    /// Absolute index one past the last pushed sample.
    total: u64,
    /// Absolute end index of the next frame (0 until the first frame).
    next_end: u64,
}

impl Framer {
    pub fn new(hop: usize, max_window: usize) -> Self {
        Self {
            hop: hop.max(1),
            max_window: max_window.max(1),
            history: VecDeque::with_capacity(max_window * 2),
            offset: 0,
            total: 0,
            next_end: 0,
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.history.extend(samples.iter().copied());
        self.total += samples.len() as u64;
    }

    /// Samples pushed so far.
    pub fn total_samples(&self) -> u64 {
        self.total
    }

    /// Returns the next frame of length `window`, if enough samples have arrived.
    pub fn next_frame(&mut self, window: usize) -> Option<Frame> {
        let window = window.clamp(1, self.max_window) as u64;
        let end = self.next_end.max(window);
        if end > self.total {
            return None;
        }
        let start = end - window;
        if start < self.offset {
            // Window grew beyond the history we kept; resume at the next hop.
            self.next_end = end + self.hop as u64;
            return None;
        }

        let from = (start - self.offset) as usize;
        let samples: Vec<f32> = self.history.range(from..from + window as usize).copied().collect();
        self.next_end = end + self.hop as u64;
        self.trim();

        Some(Frame { samples, end_sample: end })
    }

    /// Drops history no future frame can reach.
    fn trim(&mut self) {
        let keep_from = self.next_end.saturating_sub(self.max_window as u64);
        if keep_from > self.offset {
            let drop = ((keep_from - self.offset) as usize).min(self.history.len());
            self.history.drain(..drop);
            self.offset += drop as u64;
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.offset = 0;
        self.total = 0;
        self.next_end = 0;
    }
}

/// Hands a chunk to the analysis channel without blocking the audio callback.
///
/// A full channel drops the chunk; `dropped` counts how many were lost so far.
/// A disconnected receiver is not an error, the session is just ending.
/// Returns whether the chunk was delivered.
fn forward_chunk(sender: &Sender<Vec<f32>>, chunk: Vec<f32>, dropped: &mut u64) -> bool {
    match sender.try_send(chunk) {
        Ok(()) => true,
        Err(TrySendError::Full(chunk)) => {
            *dropped += 1;
            log::warn!(
                "[AUDIO] Analysis channel full, dropped {} samples ({} chunks so far)",
                chunk.len(),
                dropped
            );
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Starts audio capture from the default input device.
///
/// Every callback's samples are downmixed to mono and sent as one chunk;
/// framing happens on the receiving side.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - No device, no f32 format, or the stream failed to start
pub fn start_audio_capture(sender: Sender<Vec<f32>>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SolfegeError::Device("No input device available".to_string()))?;

    log::info!("[AUDIO] Using audio input device: {}", device.name().map_err(device_err)?);

    let configs = device.supported_input_configs().map_err(device_err)?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| SolfegeError::Device("No suitable f32 input format found".to_string()))?;

    let sample_rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    log::info!("[AUDIO] Capturing at {} Hz, {} channel(s)", sample_rate, channels);

    let err_fn = |err| log::error!("[AUDIO] An error occurred on the input stream: {}", err);

    let stream = device
        .build_input_stream(
            &config,
            {
                let mut dropped = 0u64;
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    forward_chunk(&sender, downmix(data, channels), &mut dropped);
                }
            },
            err_fn,
            None,
        )
        .map_err(device_err)?;

    stream.play().map_err(device_err)?;

    Ok((stream, sample_rate))
}

/// Finds the best supported f32 configuration for the target sample rate.
///
/// Mono is preferred, then the range closest to the target rate.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let covers = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let rate_penalty = if covers { 0 } else { min_diff.min(max_diff) };
            (rate_penalty, c.channels() != 1, c.channels())
        })
}

/// A running playback stream.
pub struct Playback {
    stream: cpal::Stream,
    finished: Arc<AtomicBool>,
    sample_rate: u32,
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("sample_rate", &self.sample_rate)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Playback {
    /// Rate of the samples actually played (and tapped).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    pub fn stop(self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("[AUDIO] Error pausing playback stream: {}", e);
        }
    }
}

/// Plays mono samples on the default output device.
///
/// If `tap` is given, every block of played samples is also sent there (at the
/// device rate, see [`Playback::sample_rate`]). The tap is dropped once the
/// last sample has been played, so the receiver observes a disconnect.
pub fn start_playback(
    samples: Vec<f32>,
    sample_rate: u32,
    tap: Option<Sender<Vec<f32>>>,
) -> Result<Playback> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SolfegeError::Device("No output device available".to_string()))?;

    log::info!("[AUDIO] Using audio output device: {}", device.name().map_err(device_err)?);

    let configs = device.supported_output_configs().map_err(device_err)?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or_else(|| SolfegeError::Device("No suitable f32 output format found".to_string()))?;
    let device_rate = sample_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(device_rate));
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    let samples = if device_rate != sample_rate {
        log::info!("[AUDIO] Resampling playback {} Hz -> {} Hz", sample_rate, device_rate);
        resample_linear(&samples, sample_rate, device_rate)
    } else {
        samples
    };

    let finished = Arc::new(AtomicBool::new(samples.is_empty()));
    let finished_flag = Arc::clone(&finished);
    let mut tap = tap;
    let mut position = 0usize;
    let mut dropped = 0u64;

    let err_fn = |err| log::error!("[AUDIO] An error occurred on the output stream: {}", err);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                let end = (position + frames).min(samples.len());
                let block = &samples[position.min(end)..end];

                for (i, frame) in data.chunks_mut(channels.max(1)).enumerate() {
                    let value = block.get(i).copied().unwrap_or(0.0);
                    frame.fill(value);
                }

                if let Some(sender) = &tap {
                    if !block.is_empty() {
                        forward_chunk(sender, block.to_vec(), &mut dropped);
                    }
                }
                position = end;

                if position >= samples.len() {
                    tap = None;
                    finished_flag.store(true, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(device_err)?;

    stream.play().map_err(device_err)?;
    log::info!("[AUDIO] Playback started at {} Hz, {} channel(s)", device_rate, channels);

    Ok(Playback { stream, finished, sample_rate: device_rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_emits_every_hop() {
        let mut framer = Framer::new(256, 2048);
        framer.push(&vec![0.0; 1024]);
        assert!(framer.next_frame(2048).is_none());

        framer.push(&vec![0.0; 1024]);
        let first = framer.next_frame(2048).unwrap();
        assert_eq!(first.samples.len(), 2048);
        assert_eq!(first.end_sample, 2048);
        assert!(framer.next_frame(2048).is_none());

        framer.push(&vec![0.0; 256]);
        assert_eq!(framer.next_frame(2048).unwrap().end_sample, 2048 + 256);
    }

    #[test]
    fn framer_frames_contain_the_right_samples() {
        let mut framer = Framer::new(4, 8);
        let ramp: Vec<f32> = (0..16).map(|i| i as f32).collect();
        framer.push(&ramp);

        let a = framer.next_frame(8).unwrap();
        assert_eq!(a.samples, (0..8).map(|i| i as f32).collect::<Vec<_>>());
        // A shorter window ends at the next hop and takes the latest samples.
        let b = framer.next_frame(4).unwrap();
        assert_eq!(b.samples, vec![8.0, 9.0, 10.0, 11.0]);
        let c = framer.next_frame(8).unwrap();
        assert_eq!(c.samples, (8..16).map(|i| i as f32).collect::<Vec<_>>());
        assert!((c.timestamp(4) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn framer_history_is_bounded() {
        let mut framer = Framer::new(512, 1024);
        for _ in 0..100 {
            framer.push(&vec![0.1; 512]);
            while framer.next_frame(1024).is_some() {}
        }
        assert!(framer.history.len() <= 1024 + 512);
        assert_eq!(framer.total_samples(), 51_200);
    }

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.3, 0.4], 1), vec![0.3, 0.4]);
    }

    #[test]
    fn resampling_changes_length() {
        let input: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample_linear(&input, 48_000, 44_100);
        assert_eq!(output.len(), 4410);
        assert_eq!(resample_linear(&input, 48_000, 48_000).len(), 4800);
    }

    #[test]
    fn wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..4410).map(|i| 0.5 * (i as f32 * 0.0627).sin()).collect();
        write_wav(&path, &samples, 44_100).unwrap();

        let decoded = load_wav(&path).unwrap();
        assert_eq!(decoded.sample_rate, 44_100);
        assert_eq!(decoded.samples.len(), samples.len());
        assert!((decoded.duration_secs() - 0.1).abs() < 1e-6);
        for (a, b) in decoded.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn stereo_wav_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.5f32).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = load_wav(&path).unwrap();
        assert_eq!(decoded.samples.len(), 100);
        assert!(decoded.samples.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn full_channel_counts_dropped_chunks() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut dropped = 0;
        assert!(forward_chunk(&tx, vec![0.1; 4], &mut dropped));
        assert!(!forward_chunk(&tx, vec![0.2; 4], &mut dropped));
        assert!(!forward_chunk(&tx, vec![0.3; 4], &mut dropped));
        assert_eq!(dropped, 2);
        assert_eq!(rx.try_recv().unwrap(), vec![0.1; 4]);

        drop(rx);
        assert!(!forward_chunk(&tx, vec![0.4; 4], &mut dropped));
        assert_eq!(dropped, 2);
    }

    #[test]
    fn missing_wav_is_an_error() {
        assert!(load_wav("/definitely/not/here.wav").is_err());
    }
}
