//! Delay Effect
//!
//! Feedback echo with a wet/dry mix. The wet path feeds each sample back into
//! the sample `delay` later, in place, so echoes repeat and decay rather than
//! sounding once. The mixed result is peak-normalized over all channels.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::dispatch::map_channels;
use crate::engine::AudioBuffer;
use crate::error::{ClipFxError, Result};

/// Feedback at or above this keeps growing until normalization
pub const STABLE_FEEDBACK_LIMIT: f32 = 0.9;

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    /// Delay time in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: f32,
    /// Portion of the delayed signal fed back (0 to 0.9 for a stable echo)
    #[serde(default = "default_feedback")]
    pub feedback: f32,
    /// Wet/dry balance: 0 is fully dry, 1 fully wet
    #[serde(default = "default_mix")]
    pub mix: f32,
}

fn default_delay_ms() -> f32 {
    200.0
}

fn default_feedback() -> f32 {
    0.5
}

fn default_mix() -> f32 {
    0.5
}

impl Default for Delay {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            feedback: default_feedback(),
            mix: default_mix(),
        }
    }
}

impl Delay {
    pub fn new(delay_ms: f32, feedback: f32, mix: f32) -> Self {
        Self {
            delay_ms,
            feedback,
            mix,
        }
    }

    /// Delay length in samples, rounded to the nearest sample
    pub fn delay_samples(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * self.delay_ms as f64 / 1000.0).round() as usize
    }

    /// Echo a buffer, returning a peak-normalized result
    ///
    /// A zero delay feeds every sample back into itself, which scales the wet
    /// signal by `1 + feedback`.
    ///
    /// # Errors
    /// `InvalidParameter` for a negative or non-finite delay time, or a
    /// non-finite feedback or mix.
    pub fn apply(&self, buffer: &AudioBuffer, sample_rate: u32) -> Result<AudioBuffer> {
        if !self.delay_ms.is_finite() || self.delay_ms < 0.0 {
            return Err(ClipFxError::invalid_param(
                "delay_ms",
                self.delay_ms,
                "a delay of 0 ms or more",
            ));
        }
        if !self.feedback.is_finite() {
            return Err(ClipFxError::invalid_param("feedback", self.feedback, "a finite value"));
        }
        if !self.mix.is_finite() {
            return Err(ClipFxError::invalid_param("mix", self.mix, "a finite value"));
        }
        if self.feedback.abs() >= STABLE_FEEDBACK_LIMIT {
            warn!(
                "Delay feedback {} is outside the stable range, output will be squashed by normalization",
                self.feedback
            );
        }

        let delay = self.delay_samples(sample_rate);
        let (feedback, mix) = (self.feedback, self.mix);

        info!(
            "Delay: {} ms ({} samples), feedback {}, mix {}",
            self.delay_ms, delay, feedback, mix
        );

        let mut out = map_channels(buffer, |dry| {
            let mut wet = dry.to_vec();
            for i in delay..wet.len() {
                wet[i] += wet[i - delay] * feedback;
            }

            dry.iter()
                .zip(&wet)
                .map(|(&d, &w)| (1.0 - mix) * d + mix * w)
                .collect()
        })?;

        out.normalize_peak();
        Ok(out)
    }
}

/// Apply a feedback delay
pub fn apply_delay(
    buffer: &AudioBuffer,
    sample_rate: u32,
    delay_ms: f32,
    feedback: f32,
    mix: f32,
) -> Result<AudioBuffer> {
    Delay::new(delay_ms, feedback, mix).apply(buffer, sample_rate)
}
