//! Error types for solfege-core

use std::io;
use thiserror::Error;

/// Errors raised by the headless transcription core.
#[derive(Error, Debug)]
pub enum SolfegeError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WAV decoding or encoding failed
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Settings or score (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No usable audio device, or the device refused the stream
    #[error("Audio device error: {0}")]
    Device(String),

    /// Settings failed validation
    #[error("Invalid settings: {0}")]
    Config(String),

    /// A note name could not be parsed
    #[error("Unknown note name: {0}")]
    UnknownNote(String),

    /// A loaded score has an unusable tempo or time signature
    #[error("Invalid score: {0}")]
    InvalidScore(String),

    /// Input audio is unusable (empty, zero sample rate, ...)
    #[error("Invalid audio data: {0}")]
    InvalidAudio(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, SolfegeError>;

/// Maps any cpal error into [`SolfegeError::Device`].
pub(crate) fn device_err<E: std::fmt::Display>(err: E) -> SolfegeError {
    SolfegeError::Device(err.to_string())
}
