//! Short-time Fourier transform
//!
//! Centered STFT with a periodic Hann window: the signal is zero-padded by
//! half a frame on each side, so frame `t` is centered on sample `t * hop`.
//! The inverse is a windowed overlap-add normalized by the summed squared
//! window, trimmed or zero-padded to an exact output length.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::{ClipFxError, Result};

/// Default frame length in samples
pub const DEFAULT_N_FFT: usize = 2048;
/// Default hop between frames in samples
pub const DEFAULT_HOP: usize = 512;

/// One STFT frame: `n_fft / 2 + 1` complex bins from DC to Nyquist
pub type Frame = Vec<Complex64>;

/// Planned forward/inverse transform pair with a fixed frame layout
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish()
    }
}

impl Default for Stft {
    fn default() -> Self {
        Self::build(DEFAULT_N_FFT, DEFAULT_HOP)
    }
}

impl Stft {
    /// Plan an STFT
    ///
    /// # Errors
    /// `InvalidParameter` if `n_fft` is odd or smaller than 2, or `hop` is
    /// zero or longer than a frame.
    pub fn new(n_fft: usize, hop: usize) -> Result<Self> {
        if n_fft < 2 || n_fft % 2 != 0 {
            return Err(ClipFxError::invalid_param("n_fft", n_fft, "an even size >= 2"));
        }
        if hop == 0 || hop > n_fft {
            return Err(ClipFxError::invalid_param(
                "hop",
                hop,
                format!("1..={} samples", n_fft),
            ));
        }
        Ok(Self::build(n_fft, hop))
    }

    fn build(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop,
            window: hann_periodic(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of frequency bins per frame
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Analyse a signal into frames of complex bins
    pub fn forward(&self, signal: &[f32]) -> Vec<Frame> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0_f64; signal.len() + 2 * pad];
        for (dst, &src) in padded[pad..].iter_mut().zip(signal) {
            *dst = src as f64;
        }

        let mut scratch = vec![Complex64::default(); self.forward.get_inplace_scratch_len()];
        (0..self.frame_count(signal.len()))
            .map(|t| {
                let start = t * self.hop;
                let mut frame: Vec<Complex64> = padded[start..start + self.n_fft]
                    .iter()
                    .zip(&self.window)
                    .map(|(&s, &w)| Complex64::new(s * w, 0.0))
                    .collect();
                self.forward.process_with_scratch(&mut frame, &mut scratch);
                frame.truncate(self.bins());
                frame
            })
            .collect()
    }

    /// Resynthesize a signal of exactly `length` samples from frames
    pub fn inverse(&self, frames: &[Frame], length: usize) -> Vec<f32> {
        if frames.is_empty() {
            return vec![0.0; length];
        }

        let n = self.n_fft;
        let half = n / 2;
        let total = n + self.hop * (frames.len() - 1);
        let mut output = vec![0.0_f64; total];
        let mut window_sum = vec![0.0_f64; total];
        let mut full = vec![Complex64::default(); n];
        let mut scratch = vec![Complex64::default(); self.inverse.get_inplace_scratch_len()];

        for (t, frame) in frames.iter().enumerate() {
            // rebuild the Hermitian spectrum; DC and Nyquist are real
            for k in 0..=half {
                let bin = frame.get(k).copied().unwrap_or_default();
                full[k] = if k == 0 || k == half {
                    Complex64::new(bin.re, 0.0)
                } else {
                    bin
                };
            }
            for k in 1..half {
                full[n - k] = full[k].conj();
            }

            self.inverse.process_with_scratch(&mut full, &mut scratch);

            let start = t * self.hop;
            for i in 0..n {
                let w = self.window[i];
                output[start + i] += full[i].re / n as f64 * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(&window_sum) {
            if norm > f64::MIN_POSITIVE {
                *sample /= norm;
            }
        }

        let mut signal: Vec<f32> = output
            .iter()
            .skip(half)
            .take(length)
            .map(|&s| s as f32)
            .collect();
        signal.resize(length, 0.0);
        signal
    }
}

/// Periodic Hann window, as used for spectral analysis/resynthesis
pub fn hann_periodic(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn noise(len: usize) -> Vec<f32> {
        // deterministic LCG, no external RNG needed
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_frame_layout() {
        let stft = Stft::default();
        assert_eq!(stft.bins(), 1025);
        assert_eq!(stft.frame_count(0), 1);
        assert_eq!(stft.frame_count(511), 1);
        assert_eq!(stft.frame_count(512), 2);
        assert_eq!(stft.frame_count(44100), 87);

        let frames = stft.forward(&vec![0.0; 1000]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 1025));
    }

    #[test]
    fn test_perfect_reconstruction() {
        let stft = Stft::default();
        let signal = noise(10_000);
        let rebuilt = stft.inverse(&stft.forward(&signal), signal.len());

        assert_eq!(rebuilt.len(), signal.len());
        for (a, b) in signal.iter().zip(&rebuilt) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_short_signal_reconstruction() {
        let stft = Stft::new(256, 64).unwrap();
        let signal = noise(100);
        let rebuilt = stft.inverse(&stft.forward(&signal), signal.len());
        for (a, b) in signal.iter().zip(&rebuilt) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_inverse_pads_to_length() {
        let stft = Stft::new(256, 64).unwrap();
        let frames = stft.forward(&noise(64));
        let out = stft.inverse(&frames, 1000);
        assert_eq!(out.len(), 1000);
        assert!(out[900..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_tone_peaks_in_expected_bin() {
        let stft = Stft::default();
        // bin 100 at 44.1 kHz with n_fft 2048
        let freq = 100.0 * 44100.0 / 2048.0;
        let signal: Vec<f32> = (0..8192)
            .map(|i| (2.0 * PI * freq * i as f64 / 44100.0).sin() as f32)
            .collect();
        let frames = stft.forward(&signal);
        let mid = &frames[frames.len() / 2];
        let (peak_bin, _) = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .unwrap();
        assert_eq!(peak_bin, 100);
    }

    #[test]
    fn test_rejects_bad_layout() {
        assert!(Stft::new(1023, 256).is_err());
        assert!(Stft::new(1024, 0).is_err());
        assert!(Stft::new(1024, 2048).is_err());
    }
}
