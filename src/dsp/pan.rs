//! Constant-power stereo panning

use log::{debug, info};

use crate::engine::AudioBuffer;

/// Left and right gains for a pan position in [-1, 1]
///
/// The pan maps to an angle of `(pan + 1) * 45` degrees; the gains are its
/// cosine and sine, so `left^2 + right^2 == 1`. The centre is about 0.7071
/// on both sides, not unity.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = ((pan as f64 + 1.0) * 45.0).to_radians();
    (angle.cos() as f32, angle.sin() as f32)
}

/// Pan a stereo buffer; mono buffers come back unchanged
///
/// `pan` is -1 for hard left, 0 for centre and 1 for hard right. Values
/// outside that range are not clamped. No normalization is applied.
pub fn apply_panning(buffer: &AudioBuffer, _sample_rate: u32, pan: f32) -> AudioBuffer {
    if !buffer.is_stereo() {
        debug!("Panning skipped for mono buffer");
        return buffer.clone();
    }

    let (left_gain, right_gain) = pan_gains(pan);
    info!(
        "Pan {:+.2}: left gain {:.4}, right gain {:.4}",
        pan, left_gain, right_gain
    );

    let mut out = buffer.clone();
    out.channel_mut(0).iter_mut().for_each(|s| *s *= left_gain);
    out.channel_mut(1).iter_mut().for_each(|s| *s *= right_gain);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn stereo() -> AudioBuffer {
        AudioBuffer::stereo(vec![1.0, -0.5, 0.25], vec![0.5, 1.0, -1.0]).unwrap()
    }

    #[test]
    fn test_center_scales_both_channels_equally() {
        let input = stereo();
        let out = apply_panning(&input, 44100, 0.0);

        for ch in 0..2 {
            for (o, i) in out.channel(ch).iter().zip(input.channel(ch)) {
                assert_abs_diff_eq!(*o, i * std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_hard_left_silences_right() {
        let out = apply_panning(&stereo(), 44100, -1.0);
        assert_eq!(out.channel(0), stereo().channel(0));
        assert!(out.channel(1).iter().all(|s| s.abs() < 1e-7));
    }

    #[test]
    fn test_hard_right_silences_left() {
        let out = apply_panning(&stereo(), 44100, 1.0);
        assert!(out.channel(0).iter().all(|s| s.abs() < 1e-7));
        for (o, i) in out.channel(1).iter().zip(stereo().channel(1)) {
            assert_abs_diff_eq!(*o, *i, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_mono_is_unchanged() {
        let mono = AudioBuffer::mono(vec![0.1, 0.2, 0.3]);
        assert_eq!(apply_panning(&mono, 44100, 0.7), mono);
    }

    #[test_case(-1.0)]
    #[test_case(-0.3)]
    #[test_case(0.0)]
    #[test_case(0.55)]
    #[test_case(1.0)]
    fn test_gains_preserve_power(pan: f32) {
        let (l, r) = pan_gains(pan);
        assert_abs_diff_eq!(l * l + r * r, 1.0, epsilon = 1e-6);
    }
}
