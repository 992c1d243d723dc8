//! Three-band equalizer
//!
//! Splits each channel into bass, mid and treble bands with order-5
//! Butterworth filters, scales each band by its gain and sums them back. The
//! summed buffer is then peak-normalized over all channels at once, so the
//! balance between left and right survives.

use log::info;
use serde::{Deserialize, Serialize};

use super::butterworth::{FilterBand, SosFilter};
use super::dispatch::map_channels;
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Upper edge of the bass band (low-pass)
pub const BASS_CUTOFF_HZ: f64 = 250.0;
/// Lower edge of the mid band
pub const MID_LOW_HZ: f64 = 251.0;
/// Upper edge of the mid band
pub const MID_HIGH_HZ: f64 = 4000.0;
/// Lower edge of the treble band (high-pass)
pub const TREBLE_CUTOFF_HZ: f64 = 4001.0;

const BAND_ORDER: usize = 5;

/// Band gains in decibels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThreeBandEq {
    #[serde(default)]
    pub bass_db: f32,
    #[serde(default)]
    pub mid_db: f32,
    #[serde(default)]
    pub treble_db: f32,
}

impl ThreeBandEq {
    pub fn new(bass_db: f32, mid_db: f32, treble_db: f32) -> Self {
        Self {
            bass_db,
            mid_db,
            treble_db,
        }
    }

    /// Equalize a buffer, returning a peak-normalized result
    ///
    /// # Errors
    /// `InvalidParameter` if the sample rate is too low for the treble band
    /// (Nyquist must exceed 4001 Hz).
    pub fn apply(&self, buffer: &AudioBuffer, sample_rate: u32) -> Result<AudioBuffer> {
        let bass = SosFilter::butterworth(
            BAND_ORDER,
            FilterBand::LowPass {
                cutoff_hz: BASS_CUTOFF_HZ,
            },
            sample_rate,
        )?;
        let mid = SosFilter::butterworth(
            BAND_ORDER,
            FilterBand::BandPass {
                low_hz: MID_LOW_HZ,
                high_hz: MID_HIGH_HZ,
            },
            sample_rate,
        )?;
        let treble = SosFilter::butterworth(
            BAND_ORDER,
            FilterBand::HighPass {
                cutoff_hz: TREBLE_CUTOFF_HZ,
            },
            sample_rate,
        )?;

        let gains = [
            db_to_linear(self.bass_db),
            db_to_linear(self.mid_db),
            db_to_linear(self.treble_db),
        ];

        info!(
            "EQ: bass {:+.1} dB, mid {:+.1} dB, treble {:+.1} dB",
            self.bass_db, self.mid_db, self.treble_db
        );

        let mut out = map_channels(buffer, |channel| {
            let mut summed = vec![0.0_f32; channel.len()];
            for (filter, gain) in [&bass, &mid, &treble].into_iter().zip(gains) {
                for (acc, band) in summed.iter_mut().zip(filter.filter(channel)) {
                    *acc += band * gain;
                }
            }
            summed
        })?;

        // peak over the stacked buffer, never per channel
        out.normalize_peak();
        Ok(out)
    }
}

/// Apply a three-band EQ with gains in dB
pub fn apply_eq(
    buffer: &AudioBuffer,
    sample_rate: u32,
    bass_db: f32,
    mid_db: f32,
    treble_db: f32,
) -> Result<AudioBuffer> {
    ThreeBandEq::new(bass_db, mid_db, treble_db).apply(buffer, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{generate_stereo_test_tone, generate_test_tone};
    use approx::assert_relative_eq;

    const SR: u32 = 44100;

    fn rms(samples: &[f32]) -> f64 {
        (samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_flat_eq_normalizes_to_unity_peak() {
        let mut buffer = generate_test_tone(1000.0, 0.5, SR);
        buffer.apply_gain(0.3);

        let out = apply_eq(&buffer, SR, 0.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(out.peak(), 1.0, epsilon = 1e-6);
        assert_eq!(out.len(), buffer.len());
    }

    #[test]
    fn test_silence_stays_silent() {
        let buffer = AudioBuffer::mono(vec![0.0; 2048]);
        let out = apply_eq(&buffer, SR, 6.0, -6.0, 3.0).unwrap();
        assert!(out.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_normalization_is_global_across_channels() {
        // right channel at a quarter of the left level
        let mut buffer = generate_stereo_test_tone(1000.0, 1000.0, 0.5, SR);
        buffer.channel_mut(1).iter_mut().for_each(|s| *s *= 0.25);

        let out = apply_eq(&buffer, SR, 0.0, 0.0, 0.0).unwrap();

        let ratio = rms(out.channel(1)) / rms(out.channel(0));
        assert_relative_eq!(ratio, 0.25, epsilon = 1e-3);
        assert_relative_eq!(out.peak(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bass_cut_attenuates_low_tone_relative_to_treble() {
        // left: bass tone, right: treble tone
        let buffer = generate_stereo_test_tone(80.0, 8000.0, 0.5, SR);
        let out = apply_eq(&buffer, SR, -12.0, 0.0, 0.0).unwrap();

        let ratio = rms(out.channel(0)) / rms(out.channel(1));
        // -12 dB is a factor of about 0.25
        assert!(ratio > 0.2 && ratio < 0.3, "bass/treble ratio {}", ratio);
    }

    #[test]
    fn test_low_sample_rate_rejected() {
        let buffer = generate_test_tone(440.0, 0.1, 8000);
        let err = apply_eq(&buffer, 8000, 0.0, 0.0, 0.0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }
}
