//! Digital Butterworth filter design
//!
//! Designs low-pass, high-pass and band-pass Butterworth filters of any order
//! the same way classic filter-design toolkits do: analog prototype poles,
//! frequency transformation with pre-warped corners, bilinear transform, then
//! grouping into second-order sections. Filtering runs the sections in cascade
//! with Direct Form II Transposed state, which keeps high orders stable where a
//! single long polynomial would not be.

use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{ClipFxError, Result};

/// Poles with an imaginary part below this are treated as real
const IMAG_TOLERANCE: f64 = 1e-10;

/// Response shape of a Butterworth filter, with corner frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter_type", rename_all = "lowercase")]
pub enum FilterBand {
    /// Pass below `cutoff_hz`
    LowPass { cutoff_hz: f64 },
    /// Pass above `cutoff_hz`
    HighPass { cutoff_hz: f64 },
    /// Pass between `low_hz` and `high_hz`
    BandPass { low_hz: f64, high_hz: f64 },
}

impl FilterBand {
    /// Corner frequencies normalized to Nyquist, validated to lie in (0, 1)
    fn normalized(&self, sample_rate: u32) -> Result<NormalizedBand> {
        if sample_rate == 0 {
            return Err(ClipFxError::invalid_param(
                "sample_rate",
                sample_rate,
                "a positive sample rate",
            ));
        }
        let nyquist = sample_rate as f64 / 2.0;

        match *self {
            FilterBand::LowPass { cutoff_hz } => Ok(NormalizedBand::LowPass(
                normalize_corner("cutoff_hz", cutoff_hz, nyquist)?,
            )),
            FilterBand::HighPass { cutoff_hz } => Ok(NormalizedBand::HighPass(
                normalize_corner("cutoff_hz", cutoff_hz, nyquist)?,
            )),
            FilterBand::BandPass { low_hz, high_hz } => {
                let low = normalize_corner("low_hz", low_hz, nyquist)?;
                let high = normalize_corner("high_hz", high_hz, nyquist)?;
                if low >= high {
                    return Err(ClipFxError::invalid_param(
                        "low_hz",
                        low_hz,
                        format!("a low cutoff below the high cutoff ({} Hz)", high_hz),
                    ));
                }
                Ok(NormalizedBand::BandPass(low, high))
            }
        }
    }
}

enum NormalizedBand {
    LowPass(f64),
    HighPass(f64),
    BandPass(f64, f64),
}

fn normalize_corner(param: &str, hz: f64, nyquist: f64) -> Result<f64> {
    let wn = hz / nyquist;
    if !wn.is_finite() || wn <= 0.0 || wn >= 1.0 {
        return Err(ClipFxError::invalid_param(
            param,
            hz,
            format!("0 < frequency < {} Hz (Nyquist)", nyquist),
        ));
    }
    Ok(wn)
}

/// Biquad filter coefficients, normalized so that a0 == 1
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        (self.b0 + z1 * self.b1 + z2 * self.b2) / (1.0 + z1 * self.a1 + z2 * self.a2)
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    s1: f64,
    s2: f64,
}

impl BiquadState {
    /// Direct Form II Transposed
    #[inline]
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output = c.b0 * input + self.s1;
        self.s1 = c.b1 * input - c.a1 * output + self.s2;
        self.s2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// A cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<BiquadCoeffs>,
}

impl SosFilter {
    /// Design a digital Butterworth filter
    ///
    /// # Arguments
    /// * `order` - Filter order (band-pass filters end up with twice as many poles)
    /// * `band` - Response shape and corner frequencies in Hz
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Errors
    /// `InvalidParameter` when the order is zero, a corner is not strictly
    /// between 0 and Nyquist, or a band-pass low corner is not below the high
    /// corner.
    pub fn butterworth(order: usize, band: FilterBand, sample_rate: u32) -> Result<Self> {
        if order == 0 {
            return Err(ClipFxError::invalid_param("order", order, "order >= 1"));
        }

        let prototype = prototype_poles(order);

        // Pre-warp for the bilinear transform with fs = 2
        let warp = |wn: f64| 4.0 * (PI * wn / 2.0).tan();

        let (zeros, poles, gain) = match band.normalized(sample_rate)? {
            NormalizedBand::LowPass(wn) => lowpass_zpk(&prototype, warp(wn)),
            NormalizedBand::HighPass(wn) => highpass_zpk(&prototype, warp(wn)),
            NormalizedBand::BandPass(low, high) => {
                bandpass_zpk(&prototype, warp(low), warp(high))
            }
        };

        let (zeros, poles, gain) = bilinear_zpk(zeros, poles, gain);
        let sections = zpk_to_sections(zeros, poles, gain);

        log::debug!(
            "Designed order-{} Butterworth {:?} at {} Hz: {} section(s)",
            order,
            band,
            sample_rate,
            sections.len()
        );

        Ok(Self { sections })
    }

    /// The second-order sections, first to last
    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    /// Run the cascade over a signal from rest, returning a new signal
    pub fn filter(&self, input: &[f32]) -> Vec<f32> {
        let mut states = vec![BiquadState::default(); self.sections.len()];

        input
            .iter()
            .map(|&x| {
                let mut y = x as f64;
                for (state, coeffs) in states.iter_mut().zip(&self.sections) {
                    y = state.process(y, coeffs);
                }
                y as f32
            })
            .collect()
    }

    /// Magnitude response at a frequency in Hz
    pub fn magnitude_at(&self, frequency_hz: f64, sample_rate: u32) -> f64 {
        let w = 2.0 * PI * frequency_hz / sample_rate as f64;
        self.sections
            .iter()
            .map(|s| s.response(w))
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

/// Analog Butterworth prototype poles (unit cutoff, no zeros, unity gain)
fn prototype_poles(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|k| {
            let m = -(n - 1.0) + 2.0 * k as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

type Zpk = (Vec<Complex64>, Vec<Complex64>, f64);

fn lowpass_zpk(prototype: &[Complex64], wo: f64) -> Zpk {
    let poles: Vec<Complex64> = prototype.iter().map(|&p| p * wo).collect();
    let gain = wo.powi(prototype.len() as i32);
    (Vec::new(), poles, gain)
}

fn highpass_zpk(prototype: &[Complex64], wo: f64) -> Zpk {
    let poles: Vec<Complex64> = prototype.iter().map(|&p| wo / p).collect();
    let zeros = vec![Complex64::new(0.0, 0.0); prototype.len()];
    let gain = (1.0 / prototype.iter().map(|&p| -p).product::<Complex64>()).re;
    (zeros, poles, gain)
}

fn bandpass_zpk(prototype: &[Complex64], low: f64, high: f64) -> Zpk {
    let bw = high - low;
    let wo = (low * high).sqrt();

    let mut poles = Vec::with_capacity(prototype.len() * 2);
    for &p in prototype {
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - wo * wo).sqrt();
        poles.push(p_lp + root);
        poles.push(p_lp - root);
    }

    let zeros = vec![Complex64::new(0.0, 0.0); prototype.len()];
    let gain = bw.powi(prototype.len() as i32);
    (zeros, poles, gain)
}

/// Bilinear transform with fs = 2; zeros at infinity map to z = -1
fn bilinear_zpk(zeros: Vec<Complex64>, poles: Vec<Complex64>, gain: f64) -> Zpk {
    let fs2 = 4.0;
    let degree = poles.len() - zeros.len();

    let num: Complex64 = zeros.iter().map(|&z| fs2 - z).product();
    let den: Complex64 = poles.iter().map(|&p| fs2 - p).product();
    let gain = gain * (num / den).re;

    let mut digital_zeros: Vec<Complex64> = zeros.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    digital_zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let digital_poles = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();

    (digital_zeros, digital_poles, gain)
}

/// Group poles and (real) zeros into biquads
///
/// Conjugate pole pairs become one section each, ordered so the poles closest
/// to the unit circle come last. Real poles are paired up, leaving at most one
/// first-order section. The overall gain lands on the first section.
fn zpk_to_sections(zeros: Vec<Complex64>, poles: Vec<Complex64>, gain: f64) -> Vec<BiquadCoeffs> {
    let mut complex_poles: Vec<Complex64> = poles
        .iter()
        .filter(|p| p.im > IMAG_TOLERANCE)
        .copied()
        .collect();
    complex_poles.sort_by(|a, b| a.norm().total_cmp(&b.norm()));

    let mut real_poles: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= IMAG_TOLERANCE)
        .map(|p| p.re)
        .collect();
    real_poles.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

    // Butterworth zeros sit on the real axis (z = +1 and/or z = -1)
    let mut real_zeros: Vec<f64> = zeros.iter().map(|z| z.re).collect();
    real_zeros.sort_by(f64::total_cmp);
    let mut zeros = interleave_ends(real_zeros).into_iter();

    let mut sections = Vec::with_capacity(poles.len() / 2 + 1);

    for pair in real_poles.chunks(2) {
        let section = match *pair {
            [r1, r2] => {
                let (z1, z2) = (zeros.next().unwrap_or(0.0), zeros.next().unwrap_or(0.0));
                BiquadCoeffs {
                    b0: 1.0,
                    b1: -(z1 + z2),
                    b2: z1 * z2,
                    a1: -(r1 + r2),
                    a2: r1 * r2,
                }
            }
            [r] => {
                let z = zeros.next().unwrap_or(0.0);
                BiquadCoeffs {
                    b0: 1.0,
                    b1: -z,
                    b2: 0.0,
                    a1: -r,
                    a2: 0.0,
                }
            }
            _ => continue,
        };
        sections.push(section);
    }

    for p in complex_poles {
        let (z1, z2) = (zeros.next().unwrap_or(0.0), zeros.next().unwrap_or(0.0));
        sections.push(BiquadCoeffs {
            b0: 1.0,
            b1: -(z1 + z2),
            b2: z1 * z2,
            a1: -2.0 * p.re,
            a2: p.norm_sqr(),
        });
    }

    if let Some(first) = sections.first_mut() {
        first.b0 *= gain;
        first.b1 *= gain;
        first.b2 *= gain;
    }

    sections
}

/// [a, b, c, d] -> [a, d, b, c], so band-pass sections get one zero of each sign
fn interleave_ends(sorted: Vec<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(sorted.len());
    let (mut lo, mut hi) = (0usize, sorted.len());
    while lo < hi {
        out.push(sorted[lo]);
        lo += 1;
        if lo < hi {
            hi -= 1;
            out.push(sorted[hi]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SR: u32 = 44100;
    const HALF_POWER: f64 = std::f64::consts::FRAC_1_SQRT_2;

    #[test]
    fn test_lowpass_response() {
        let filter = SosFilter::butterworth(5, FilterBand::LowPass { cutoff_hz: 1000.0 }, SR).unwrap();

        // order 5: two biquads plus one first-order section
        assert_eq!(filter.sections().len(), 3);
        assert_abs_diff_eq!(filter.magnitude_at(0.0, SR), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(filter.magnitude_at(1000.0, SR), HALF_POWER, epsilon = 1e-6);
        assert!(filter.magnitude_at(4000.0, SR) < 1e-2);
    }

    #[test]
    fn test_highpass_response() {
        let filter = SosFilter::butterworth(5, FilterBand::HighPass { cutoff_hz: 1000.0 }, SR).unwrap();

        assert_abs_diff_eq!(filter.magnitude_at(SR as f64 / 2.0, SR), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(filter.magnitude_at(1000.0, SR), HALF_POWER, epsilon = 1e-6);
        assert!(filter.magnitude_at(100.0, SR) < 1e-4);
    }

    #[test]
    fn test_bandpass_response() {
        let band = FilterBand::BandPass {
            low_hz: 300.0,
            high_hz: 3000.0,
        };
        let filter = SosFilter::butterworth(5, band, SR).unwrap();

        assert_eq!(filter.sections().len(), 5);
        assert_abs_diff_eq!(filter.magnitude_at(300.0, SR), HALF_POWER, epsilon = 1e-6);
        assert_abs_diff_eq!(filter.magnitude_at(3000.0, SR), HALF_POWER, epsilon = 1e-6);
        assert!(filter.magnitude_at(1000.0, SR) > 0.99);
        assert!(filter.magnitude_at(30.0, SR) < 1e-3);
        assert!(filter.magnitude_at(15000.0, SR) < 1e-3);
    }

    #[test]
    fn test_wide_bandpass_has_real_poles() {
        let band = FilterBand::BandPass {
            low_hz: 20.0,
            high_hz: 20000.0,
        };
        let filter = SosFilter::butterworth(5, band, SR).unwrap();

        assert!(filter.magnitude_at(1000.0, SR) > 0.99);
        let out = filter.filter(&[1.0; 4096]);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_rejects_bad_corners() {
        let err = SosFilter::butterworth(5, FilterBand::LowPass { cutoff_hz: 22050.0 }, SR)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");

        assert!(SosFilter::butterworth(5, FilterBand::HighPass { cutoff_hz: 0.0 }, SR).is_err());
        assert!(SosFilter::butterworth(5, FilterBand::HighPass { cutoff_hz: f64::NAN }, SR).is_err());

        let inverted = FilterBand::BandPass {
            low_hz: 3000.0,
            high_hz: 300.0,
        };
        assert!(SosFilter::butterworth(5, inverted, SR).is_err());

        let equal = FilterBand::BandPass {
            low_hz: 1000.0,
            high_hz: 1000.0,
        };
        assert!(SosFilter::butterworth(5, equal, SR).is_err());
        assert!(SosFilter::butterworth(0, FilterBand::LowPass { cutoff_hz: 100.0 }, SR).is_err());
    }

    #[test]
    fn test_impulse_response_matches_dc_gain() {
        let filter = SosFilter::butterworth(5, FilterBand::LowPass { cutoff_hz: 2000.0 }, SR).unwrap();
        let mut impulse = vec![0.0_f32; 8192];
        impulse[0] = 1.0;

        let response = filter.filter(&impulse);
        let dc: f64 = response.iter().map(|&s| s as f64).sum();
        assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_interleave_ends() {
        assert_eq!(
            interleave_ends(vec![-1.0, -1.0, 1.0, 1.0]),
            vec![-1.0, 1.0, -1.0, 1.0]
        );
        assert_eq!(interleave_ends(vec![1.0, 2.0, 3.0]), vec![1.0, 3.0, 2.0]);
    }
}
