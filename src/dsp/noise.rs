//! Spectral gate noise reduction
//!
//! The opening frames of each channel are taken as a noise profile. Every STFT
//! bin whose magnitude does not clear `profile * reduction_factor` is zeroed;
//! the rest keep their magnitude and phase. There is no smoothing across time
//! or frequency, so "musical noise" artifacts are expected on busy material.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::dispatch::try_map_channels;
use super::stft::Stft;
use crate::engine::AudioBuffer;
use crate::error::{ClipFxError, Result};

/// Threshold multiplier applied to the noise profile
pub const DEFAULT_REDUCTION_FACTOR: f32 = 1.5;

/// Spectral gate parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseReducer {
    #[serde(default = "default_reduction_factor")]
    pub reduction_factor: f32,
}

fn default_reduction_factor() -> f32 {
    DEFAULT_REDUCTION_FACTOR
}

impl Default for NoiseReducer {
    fn default() -> Self {
        Self {
            reduction_factor: DEFAULT_REDUCTION_FACTOR,
        }
    }
}

impl NoiseReducer {
    pub fn new(reduction_factor: f32) -> Self {
        Self { reduction_factor }
    }

    /// Number of leading frames averaged into the noise profile
    ///
    /// `sample_rate / 10` frames, capped at the frames available and never
    /// fewer than one.
    pub fn profile_frames(sample_rate: u32, total_frames: usize) -> usize {
        (sample_rate as usize / 10).min(total_frames).max(1)
    }

    /// Gate every channel of a buffer; lengths are preserved exactly
    ///
    /// # Errors
    /// `InvalidParameter` for a negative or non-finite reduction factor.
    pub fn apply(&self, buffer: &AudioBuffer, sample_rate: u32) -> Result<AudioBuffer> {
        if !self.reduction_factor.is_finite() || self.reduction_factor < 0.0 {
            return Err(ClipFxError::invalid_param(
                "reduction_factor",
                self.reduction_factor,
                "a finite factor >= 0",
            ));
        }

        info!(
            "Noise reduction: factor {}, {} channel(s)",
            self.reduction_factor,
            buffer.channels()
        );

        let stft = Stft::default();
        try_map_channels(buffer, |channel| Ok(self.gate_channel(&stft, channel, sample_rate)))
    }

    fn gate_channel(&self, stft: &Stft, channel: &[f32], sample_rate: u32) -> Vec<f32> {
        if channel.is_empty() {
            return Vec::new();
        }

        let mut frames = stft.forward(channel);
        let profile_len = Self::profile_frames(sample_rate, frames.len());

        let mut noise_floor = vec![0.0_f64; stft.bins()];
        for frame in &frames[..profile_len] {
            for (floor, bin) in noise_floor.iter_mut().zip(frame) {
                *floor += bin.norm();
            }
        }
        noise_floor
            .iter_mut()
            .for_each(|floor| *floor /= profile_len as f64);

        let factor = self.reduction_factor as f64;
        let mut kept = 0usize;
        for frame in frames.iter_mut() {
            for (bin, floor) in frame.iter_mut().zip(&noise_floor) {
                if bin.norm() > floor * factor {
                    kept += 1;
                } else {
                    *bin = Default::default();
                }
            }
        }

        debug!(
            "Noise gate: profile {} of {} frames, kept {} of {} bins",
            profile_len,
            frames.len(),
            kept,
            frames.len() * stft.bins()
        );

        stft.inverse(&frames, channel.len())
    }
}

/// Apply spectral gate noise reduction
pub fn reduce_noise(
    buffer: &AudioBuffer,
    sample_rate: u32,
    reduction_factor: f32,
) -> Result<AudioBuffer> {
    NoiseReducer::new(reduction_factor).apply(buffer, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    fn hiss(len: usize, level: f32) -> Vec<f32> {
        let mut state: u32 = 0x9e37_79b9;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0) * level
            })
            .collect()
    }

    fn energy(samples: &[f32]) -> f64 {
        samples.iter().map(|&s| (s as f64).powi(2)).sum()
    }

    #[test]
    fn test_profile_frames() {
        assert_eq!(NoiseReducer::profile_frames(44100, 87), 87);
        assert_eq!(NoiseReducer::profile_frames(44100, 10_000), 4410);
        assert_eq!(NoiseReducer::profile_frames(5, 3), 1);
    }

    #[test]
    fn test_short_buffer_uses_whole_clip_as_profile() {
        // far shorter than sample_rate / 10 samples
        let buffer = AudioBuffer::mono(hiss(1000, 0.1));
        let out = reduce_noise(&buffer, 44100, DEFAULT_REDUCTION_FACTOR).unwrap();
        assert_eq!(out.len(), 1000);
        assert!(out.is_finite());
    }

    #[test]
    fn test_length_preserved_stereo() {
        let left = hiss(12_345, 0.2);
        let right = hiss(12_345, 0.05);
        let buffer = AudioBuffer::stereo(left, right).unwrap();
        let out = reduce_noise(&buffer, 44100, 1.5).unwrap();

        assert_eq!(out.channels(), 2);
        assert_eq!(out.len(), 12_345);
    }

    #[test]
    fn test_stationary_noise_is_suppressed() {
        let buffer = AudioBuffer::mono(hiss(44100, 0.1));
        let out = reduce_noise(&buffer, 44100, 1.5).unwrap();
        // most bins of stationary noise sit below 1.5x their own mean
        assert!(energy(out.channel(0)) < energy(buffer.channel(0)) * 0.6);
    }

    #[test]
    fn test_zero_factor_keeps_nonzero_bins() {
        let buffer = generate_test_tone(440.0, 0.2, 44100);
        let out = reduce_noise(&buffer, 44100, 0.0).unwrap();
        let ratio = energy(out.channel(0)) / energy(buffer.channel(0));
        assert!((ratio - 1.0).abs() < 1e-3, "energy ratio {}", ratio);
    }

    #[test]
    fn test_silence_stays_silent() {
        let buffer = AudioBuffer::mono(vec![0.0; 4096]);
        let out = reduce_noise(&buffer, 44100, 1.5).unwrap();
        assert!(out.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_channel_returns_empty() {
        let buffer = AudioBuffer::mono(Vec::new());
        assert!(reduce_noise(&buffer, 44100, 1.5).unwrap().is_empty());
    }

    #[test]
    fn test_negative_factor_rejected() {
        let buffer = AudioBuffer::mono(vec![0.1; 64]);
        assert!(reduce_noise(&buffer, 44100, -1.0).is_err());
    }
}
