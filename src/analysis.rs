//! Plot data for visualization
//!
//! Rendering happens elsewhere; these functions only produce the series a
//! chart needs. Waveform and spectrum look at channel 0, the spectrogram at
//! the mean of all channels.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::Serialize;

use crate::engine::AudioBuffer;

/// Spectrogram frame length
pub const SPECTROGRAM_NFFT: usize = 1024;
/// Overlap between spectrogram frames
pub const SPECTROGRAM_OVERLAP: usize = 128;

// Power below this is reported at the floor instead of -inf dB
const POWER_FLOOR: f64 = 1e-20;

// ============================================================================
// Waveform
// ============================================================================

/// Amplitude over time of channel 0
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    pub time_secs: Vec<f64>,
    pub amplitude: Vec<f32>,
}

impl Waveform {
    /// Keep at most `max_points` evenly spaced points
    pub fn decimate(&self, max_points: usize) -> Waveform {
        if max_points == 0 || self.amplitude.len() <= max_points {
            return self.clone();
        }
        let step = self.amplitude.len().div_ceil(max_points);
        Waveform {
            time_secs: self.time_secs.iter().step_by(step).copied().collect(),
            amplitude: self.amplitude.iter().step_by(step).copied().collect(),
        }
    }
}

/// Waveform of channel 0; the time axis runs from 0 to the clip duration inclusive
pub fn waveform(buffer: &AudioBuffer, sample_rate: u32) -> Waveform {
    let amplitude = buffer.channel(0).to_vec();
    let n = amplitude.len();
    let duration = n as f64 / sample_rate as f64;
    let time_secs = match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| duration * i as f64 / (n - 1) as f64)
            .collect(),
    };
    Waveform {
        time_secs,
        amplitude,
    }
}

// ============================================================================
// Spectrum
// ============================================================================

/// Magnitude spectrum of channel 0 over the whole clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Frequency of the strongest bin, ignoring DC
    pub fn peak_frequency(&self) -> Option<f64> {
        self.magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frequencies[i])
    }

    /// Magnitude-weighted mean frequency
    pub fn centroid(&self) -> f64 {
        let total: f64 = self.magnitudes.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.frequencies
            .iter()
            .zip(&self.magnitudes)
            .map(|(f, m)| f * m)
            .sum::<f64>()
            / total
    }
}

/// Unnormalized real FFT magnitude of channel 0, DC to Nyquist
pub fn spectrum(buffer: &AudioBuffer, sample_rate: u32) -> Spectrum {
    let samples = buffer.channel(0);
    let n = samples.len();
    if n == 0 {
        return Spectrum {
            frequencies: Vec::new(),
            magnitudes: Vec::new(),
        };
    }

    let fft = FftPlanner::new().plan_fft_forward(n);
    let mut data: Vec<Complex64> = samples
        .iter()
        .map(|&s| Complex64::new(s as f64, 0.0))
        .collect();
    fft.process(&mut data);

    let bins = n / 2 + 1;
    Spectrum {
        frequencies: (0..bins)
            .map(|k| k as f64 * sample_rate as f64 / n as f64)
            .collect(),
        magnitudes: data[..bins].iter().map(|c| c.norm()).collect(),
    }
}

// ============================================================================
// Spectrogram
// ============================================================================

/// Power spectral density in dB per frame of the channel mean
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrogram {
    /// Frame centres in seconds
    pub times: Vec<f64>,
    pub frequencies: Vec<f64>,
    /// `power_db[frame][bin]`
    pub power_db: Vec<Vec<f64>>,
}

/// Spectrogram with 1024-sample Hann frames overlapping by 128 samples
///
/// Clips shorter than one frame are zero-padded to a single frame.
pub fn spectrogram(buffer: &AudioBuffer, sample_rate: u32) -> Spectrogram {
    let nfft = SPECTROGRAM_NFFT;
    let hop = nfft - SPECTROGRAM_OVERLAP;
    let fs = sample_rate as f64;

    let mut mono = mono_mix(buffer);
    if mono.len() < nfft {
        mono.resize(nfft, 0.0);
    }

    // symmetric Hann
    let window: Vec<f64> = (0..nfft)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (nfft - 1) as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let fft = FftPlanner::new().plan_fft_forward(nfft);
    let bins = nfft / 2 + 1;
    let n_frames = (mono.len() - nfft) / hop + 1;

    let mut times = Vec::with_capacity(n_frames);
    let mut power_db = Vec::with_capacity(n_frames);
    let mut frame = vec![Complex64::default(); nfft];

    for t in 0..n_frames {
        let start = t * hop;
        for ((dst, &s), &w) in frame.iter_mut().zip(&mono[start..start + nfft]).zip(&window) {
            *dst = Complex64::new(s * w, 0.0);
        }
        fft.process(&mut frame);

        let row = (0..bins)
            .map(|k| {
                let mut power = frame[k].norm_sqr() / (fs * window_power);
                // one-sided: fold the negative frequencies in, except DC and Nyquist
                if k != 0 && k != bins - 1 {
                    power *= 2.0;
                }
                10.0 * power.max(POWER_FLOOR).log10()
            })
            .collect();

        power_db.push(row);
        times.push((start + nfft / 2) as f64 / fs);
    }

    Spectrogram {
        times,
        frequencies: (0..bins).map(|k| k as f64 * fs / nfft as f64).collect(),
        power_db,
    }
}

fn mono_mix(buffer: &AudioBuffer) -> Vec<f64> {
    let channels = buffer.channels().max(1) as f64;
    (0..buffer.len())
        .map(|i| {
            buffer
                .iter_channels()
                .map(|ch| ch[i] as f64)
                .sum::<f64>()
                / channels
        })
        .collect()
}

/// All three plot series together
#[derive(Debug, Clone, Serialize)]
pub struct PlotData {
    pub sample_rate: u32,
    pub waveform: Waveform,
    pub spectrum: Spectrum,
    pub spectrogram: Spectrogram,
}

impl PlotData {
    pub fn new(buffer: &AudioBuffer, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            waveform: waveform(buffer, sample_rate),
            spectrum: spectrum(buffer, sample_rate),
            spectrogram: spectrogram(buffer, sample_rate),
        }
    }
}
