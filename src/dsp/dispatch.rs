//! Per-channel dispatch
//!
//! Effects written against a single channel are lifted to mono or stereo
//! buffers here. Channels are processed independently and in order, then
//! restacked; a transform that changes the length must change every channel
//! the same way.

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Apply a fallible mono transform to every channel and restack the results
///
/// The first error aborts the whole dispatch. If the transform returns
/// channels of different lengths the result is `ChannelMismatch`.
pub fn try_map_channels<F>(buffer: &AudioBuffer, mut transform: F) -> Result<AudioBuffer>
where
    F: FnMut(&[f32]) -> Result<Vec<f32>>,
{
    let processed = buffer
        .iter_channels()
        .map(&mut transform)
        .collect::<Result<Vec<_>>>()?;

    AudioBuffer::from_channels(processed)
}

/// Apply an infallible mono transform to every channel and restack the results
pub fn map_channels<F>(buffer: &AudioBuffer, mut transform: F) -> Result<AudioBuffer>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    try_map_channels(buffer, |channel| Ok(transform(channel)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipFxError;

    #[test]
    fn test_mono_calls_transform_once() {
        let buffer = AudioBuffer::mono(vec![1.0, 2.0, 3.0]);
        let mut calls = 0;
        let out = map_channels(&buffer, |ch| {
            calls += 1;
            ch.iter().map(|s| s * 2.0).collect()
        })
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(out.channels(), 1);
        assert_eq!(out.channel(0), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_stereo_channels_are_independent() {
        let buffer = AudioBuffer::stereo(vec![1.0, 0.0], vec![0.0, 1.0]).unwrap();
        let out = map_channels(&buffer, |ch| {
            // running sum only sees its own channel
            let mut acc = 0.0;
            ch.iter()
                .map(|s| {
                    acc += s;
                    acc
                })
                .collect()
        })
        .unwrap();

        assert_eq!(out.channel(0), &[1.0, 1.0]);
        assert_eq!(out.channel(1), &[0.0, 1.0]);
    }

    #[test]
    fn test_length_change_must_match() {
        let buffer = AudioBuffer::stereo(vec![0.0; 4], vec![0.0; 4]).unwrap();

        let shortened = map_channels(&buffer, |ch| ch[..2].to_vec()).unwrap();
        assert_eq!(shortened.len(), 2);
        assert_eq!(shortened.channels(), 2);

        let mut first = true;
        let err = map_channels(&buffer, |ch| {
            let keep = if first { 2 } else { 3 };
            first = false;
            ch[..keep].to_vec()
        })
        .unwrap_err();
        assert!(matches!(err, ClipFxError::ChannelMismatch { .. }));
    }

    #[test]
    fn test_errors_propagate() {
        let buffer = AudioBuffer::stereo(vec![0.0; 4], vec![0.0; 4]).unwrap();
        let result = try_map_channels(&buffer, |_| {
            Err(ClipFxError::invalid_param("rate", 0, "> 0"))
        });
        assert_eq!(result.unwrap_err().error_code(), "INVALID_PARAMETER");
    }
}
