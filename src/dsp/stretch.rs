//! Pitch shift and time stretch
//!
//! Both effects go through a [`Stretcher`], an injected single-channel
//! capability, so the algorithm can be swapped without touching channel
//! handling. [`PhaseVocoder`] is the default.

use std::f64::consts::PI;
use std::fmt::Debug;

use log::{debug, info};
use rustfft::num_complex::Complex64;

use super::dispatch::try_map_channels;
use super::stft::{Frame, Stft, DEFAULT_HOP, DEFAULT_N_FFT};
use crate::engine::AudioBuffer;
use crate::error::{ClipFxError, Result};

// ============================================================================
// Stretcher capability
// ============================================================================

/// Single-channel time-stretch algorithm
///
/// Implementations must be deterministic: the same samples and rate always
/// produce the same output length, so stereo channels restack cleanly.
pub trait Stretcher: Debug + Send + Sync {
    /// Change duration without changing pitch
    ///
    /// `rate > 1` shortens, `rate < 1` lengthens. The output has
    /// `round(len / rate)` samples.
    fn time_stretch(&self, samples: &[f32], rate: f64) -> Result<Vec<f32>>;

    /// Change pitch by `semitones` without changing duration
    ///
    /// Stretches by `2^(-semitones / 12)` and resamples back to the input
    /// length.
    fn pitch_shift(&self, samples: &[f32], _sample_rate: u32, semitones: f64) -> Result<Vec<f32>> {
        if !semitones.is_finite() {
            return Err(ClipFxError::invalid_param("semitones", semitones, "a finite value"));
        }
        let rate = 2f64.powf(-semitones / 12.0);
        let stretched = self.time_stretch(samples, rate)?;
        let mut shifted = resample_linear(&stretched, rate);
        shifted.resize(samples.len(), 0.0);
        Ok(shifted)
    }
}

fn validate_rate(rate: f64) -> Result<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(ClipFxError::invalid_param("rate", rate, "a finite rate > 0"))
    }
}

/// Resample by `factor` with linear interpolation
///
/// The output has `ceil(len * factor)` samples.
pub fn resample_linear(samples: &[f32], factor: f64) -> Vec<f32> {
    if samples.is_empty() || factor <= 0.0 {
        return Vec::new();
    }
    let output_len = (samples.len() as f64 * factor).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / factor;
            let src_idx = src_pos as usize;
            let frac = src_pos - src_idx as f64;

            let s0 = samples.get(src_idx).copied().unwrap_or(0.0) as f64;
            let s1 = samples.get(src_idx + 1).copied().unwrap_or(s0 as f32) as f64;
            (s0 + (s1 - s0) * frac) as f32
        })
        .collect()
}

// ============================================================================
// Phase vocoder
// ============================================================================

/// STFT phase vocoder
///
/// Magnitudes are linearly interpolated between neighbouring analysis frames;
/// phases are accumulated from each bin's measured frequency deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseVocoder {
    pub n_fft: usize,
    pub hop: usize,
}

impl Default for PhaseVocoder {
    fn default() -> Self {
        Self {
            n_fft: DEFAULT_N_FFT,
            hop: DEFAULT_HOP,
        }
    }
}

impl PhaseVocoder {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        Self { n_fft, hop }
    }

    fn stretch_frames(&self, frames: &[Frame], rate: f64, bins: usize) -> Vec<Frame> {
        let n_frames = frames.len();
        let steps = (n_frames as f64 / rate).ceil() as usize;

        // expected phase advance per hop for each bin centre
        let phi_advance: Vec<f64> = (0..bins)
            .map(|k| PI * self.hop as f64 * k as f64 / (bins - 1).max(1) as f64)
            .collect();
        let mut phase_acc: Vec<f64> = frames[0].iter().map(|c| c.arg()).collect();

        let zero = vec![Complex64::default(); bins];
        let column = |i: usize| frames.get(i).unwrap_or(&zero);

        (0..steps)
            .map(|t| t as f64 * rate)
            .take_while(|&step| step < n_frames as f64)
            .map(|step| {
                let left = column(step as usize);
                let right = column(step as usize + 1);
                let alpha = step.fract();

                let out: Frame = (0..bins)
                    .map(|k| {
                        let mag = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
                        Complex64::from_polar(mag, phase_acc[k])
                    })
                    .collect();

                for k in 0..bins {
                    let mut dphase = right[k].arg() - left[k].arg() - phi_advance[k];
                    dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
                    phase_acc[k] += phi_advance[k] + dphase;
                }
                out
            })
            .collect()
    }
}

impl Stretcher for PhaseVocoder {
    fn time_stretch(&self, samples: &[f32], rate: f64) -> Result<Vec<f32>> {
        validate_rate(rate)?;
        let output_len = (samples.len() as f64 / rate).round() as usize;
        if samples.is_empty() {
            return Ok(vec![0.0; output_len]);
        }

        let stft = Stft::new(self.n_fft, self.hop)?;
        let frames = stft.forward(samples);
        let stretched = self.stretch_frames(&frames, rate, stft.bins());
        debug!(
            "Phase vocoder: {} -> {} frames at rate {:.4}",
            frames.len(),
            stretched.len(),
            rate
        );

        Ok(stft.inverse(&stretched, output_len))
    }
}

// ============================================================================
// Buffer-level effects
// ============================================================================

/// Shift the pitch of every channel; the length is unchanged
pub fn apply_pitch_shift(
    buffer: &AudioBuffer,
    sample_rate: u32,
    semitones: f64,
    stretcher: &dyn Stretcher,
) -> Result<AudioBuffer> {
    info!("Pitch shift: {:+} semitones", semitones);
    try_map_channels(buffer, |channel| {
        stretcher.pitch_shift(channel, sample_rate, semitones)
    })
}

/// Stretch every channel in time by `rate`
///
/// # Errors
/// `InvalidParameter` unless `rate` is finite and positive.
pub fn apply_time_stretch(
    buffer: &AudioBuffer,
    _sample_rate: u32,
    rate: f64,
    stretcher: &dyn Stretcher,
) -> Result<AudioBuffer> {
    validate_rate(rate)?;
    info!(
        "Time stretch: rate {} ({} -> ~{} samples)",
        rate,
        buffer.len(),
        (buffer.len() as f64 / rate).round()
    );
    try_map_channels(buffer, |channel| stretcher.time_stretch(channel, rate))
}

/// Pitch shift with the default phase vocoder
pub fn pitch_shift(buffer: &AudioBuffer, sample_rate: u32, semitones: f64) -> Result<AudioBuffer> {
    apply_pitch_shift(buffer, sample_rate, semitones, &PhaseVocoder::default())
}

/// Time stretch with the default phase vocoder
pub fn time_stretch(buffer: &AudioBuffer, sample_rate: u32, rate: f64) -> Result<AudioBuffer> {
    apply_time_stretch(buffer, sample_rate, rate, &PhaseVocoder::default())
}
