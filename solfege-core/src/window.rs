//! Adaptive analysis-window sizing.
//!
//! Low notes need long frames to hold several periods; high notes are
//! tracked with less latency in short frames. The sizer follows the detected
//! pitch with hysteresis so the window does not flap between sizes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolfegeError};

/// Window sizing and framing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Window used at startup and after long silences.
    pub default_size: usize,
    pub min_size: usize,
    pub max_size: usize,
    /// Samples between successive frames.
    pub hop_size: usize,
    /// When false the window stays at `default_size`.
    pub adaptive: bool,
    /// Periods of the detected pitch a window must hold.
    pub periods: f32,
    /// Consecutive frames that must request a new size before switching.
    pub hold_frames: usize,
    /// Unpitched frames after which the window returns to the default.
    pub reset_after: usize,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            default_size: 2048,
            min_size: 1024,
            max_size: 8192,
            hop_size: 512,
            adaptive: true,
            periods: 4.0,
            hold_frames: 3,
            reset_after: 30,
        }
    }
}

impl WindowSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("default_size", self.default_size),
            ("min_size", self.min_size),
            ("max_size", self.max_size),
        ] {
            if size < 64 || !size.is_power_of_two() {
                return Err(SolfegeError::Config(format!(
                    "window {name} must be a power of two >= 64, got {size}"
                )));
            }
        }
        if !(self.min_size <= self.default_size && self.default_size <= self.max_size) {
            return Err(SolfegeError::Config(
                "window sizes must satisfy min_size <= default_size <= max_size".to_string(),
            ));
        }
        if self.hop_size == 0 || self.hop_size > self.min_size {
            return Err(SolfegeError::Config(format!(
                "hop_size must be in 1..={}, got {}",
                self.min_size, self.hop_size
            )));
        }
        if !(self.periods >= 1.0) {
            return Err(SolfegeError::Config("periods must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Smallest power-of-two window holding `periods` cycles of `frequency`.
pub fn required_size(frequency: f32, sample_rate: u32, periods: f32) -> usize {
    if !(frequency > 0.0) || !frequency.is_finite() {
        return usize::MAX;
    }
    let samples = (periods * sample_rate as f32 / frequency).ceil().max(1.0) as usize;
    samples.next_power_of_two()
}

/// Tracks the current analysis window size.
#[derive(Debug, Clone)]
pub struct WindowSizer {
    settings: WindowSettings,
    current: usize,
    pending: Option<usize>,
    pending_count: usize,
    unpitched: usize,
}

impl WindowSizer {
    pub fn new(settings: WindowSettings) -> Self {
        let current = settings.default_size;
        Self {
            settings,
            current,
            pending: None,
            pending_count: 0,
            unpitched: 0,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn max_size(&self) -> usize {
        self.settings.max_size
    }

    /// Feeds the pitch of the latest frame; returns the window for the next one.
    pub fn observe(&mut self, frequency: Option<f32>, sample_rate: u32) -> usize {
        if !self.settings.adaptive {
            return self.current;
        }

        let Some(frequency) = frequency else {
            self.unpitched += 1;
            self.pending = None;
            self.pending_count = 0;
            if self.unpitched >= self.settings.reset_after && self.current != self.settings.default_size {
                log::debug!("[WINDOW] Silence, back to {} samples", self.settings.default_size);
                self.current = self.settings.default_size;
            }
            return self.current;
        };
        self.unpitched = 0;

        let target = required_size(frequency, sample_rate, self.settings.periods)
            .clamp(self.settings.min_size, self.settings.max_size);

        if target == self.current {
            self.pending = None;
            self.pending_count = 0;
        } else if self.pending == Some(target) {
            self.pending_count += 1;
        } else {
            self.pending = Some(target);
            self.pending_count = 1;
        }

        if self.pending_count >= self.settings.hold_frames {
            log::debug!(
                "[WINDOW] {:.1} Hz -> window {} -> {} samples",
                frequency, self.current, target
            );
            self.current = target;
            self.pending = None;
            self.pending_count = 0;
        }
        self.current
    }
}
