//! Audio codec I/O for clipfx
//!
//! `decode` turns container bytes into a float buffer plus its sample rate and
//! `encode` does the reverse. WAV goes through hound both ways; MP3, FLAC and
//! OGG/Vorbis are decoded with symphonia. Lossy export uses native encoders
//! behind the `mp3` and `ogg` cargo features.
//!
//! No resampling happens here: the sample rate of the source is the sample
//! rate of the session.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{ClipFxError, Result};

/// Container formats the pipeline can export to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// 32-bit float WAV, lossless
    #[default]
    Wav,
    /// MPEG-1 Layer III via LAME
    Mp3,
    /// Ogg Vorbis via libvorbis
    Ogg,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Ogg => "ogg",
        }
    }

    /// Whether decoding the export reproduces the buffer exactly
    pub fn is_lossless(&self) -> bool {
        matches!(self, ExportFormat::Wav)
    }

    /// Whether this build can encode the format
    pub fn is_available(&self) -> bool {
        match self {
            ExportFormat::Wav => true,
            ExportFormat::Mp3 => cfg!(feature = "mp3"),
            ExportFormat::Ogg => cfg!(feature = "ogg"),
        }
    }

    /// Pick the export format from a file path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ClipFxError::UnsupportedFormat {
                format: format!("no file extension on '{}'", path.display()),
            })?;
        ext.parse()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ClipFxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            "ogg" | "oga" => Ok(ExportFormat::Ogg),
            other => Err(ClipFxError::UnsupportedFormat {
                format: format!("'{}' (export supports wav, mp3, ogg)", other),
            }),
        }
    }
}

// ============================================================================
// Decode
// ============================================================================

/// Decode an in-memory audio file into a buffer and its sample rate
///
/// # Arguments
/// * `bytes` - The complete file contents
/// * `hint` - Optional file extension (e.g. `"mp3"`) to speed up probing
///
/// # Returns
/// A mono `(N, 1)` or stereo `(N, 2)` buffer and the source sample rate.
///
/// # Errors
/// * `Decode` - the bytes are corrupt or not a recognised container
/// * `UnsupportedFormat` - more than two channels, or an unsupported codec
/// * `EmptyAudio` - the file decodes to zero samples
pub fn decode(bytes: &[u8], hint: Option<&str>) -> Result<(AudioBuffer, u32)> {
    if bytes.is_empty() {
        return Err(ClipFxError::Decode {
            reason: "input is empty".to_string(),
            source: None,
        });
    }

    let (buffer, sample_rate) = if looks_like_wav(bytes) {
        match decode_wav(bytes) {
            Ok(decoded) => decoded,
            Err(ClipFxError::Decode { reason, .. }) => {
                debug!("hound could not read WAV ({}), retrying with symphonia", reason);
                decode_with_symphonia(bytes, Some("wav"))?
            }
            Err(other) => return Err(other),
        }
    } else {
        decode_with_symphonia(bytes, hint)?
    };

    if sample_rate == 0 {
        return Err(ClipFxError::Decode {
            reason: "sample rate is 0".to_string(),
            source: None,
        });
    }
    if buffer.is_empty() {
        return Err(ClipFxError::EmptyAudio);
    }

    info!(
        "Decoded {} channel(s), {} samples at {} Hz ({:.2}s)",
        buffer.channels(),
        buffer.len(),
        sample_rate,
        buffer.duration_secs(sample_rate)
    );

    Ok((buffer, sample_rate))
}

fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<(AudioBuffer, u32)> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| ClipFxError::Decode {
        reason: format!("Failed to open WAV data: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let layout = channel_layout(spec.channels as usize)?;
    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&samples, layout)?;

    Ok((buffer, spec.sample_rate))
}

fn decode_with_symphonia(bytes: &[u8], hint: Option<&str>) -> Result<(AudioBuffer, u32)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(ext) = hint {
        probe_hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &probe_hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ClipFxError::Decode {
            reason: format!("Failed to probe audio: {}", e),
            source: Some(Box::new(e)),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClipFxError::Decode {
            reason: "No audio tracks found".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ClipFxError::UnsupportedFormat {
            format: format!("codec not supported: {}", e),
        })?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(ClipFxError::Decode {
                    reason: format!("Failed to read packet: {}", e),
                    source: Some(Box::new(e)),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(sample_buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // A single corrupt frame is skipped, matching most players
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => {
                return Err(ClipFxError::Decode {
                    reason: format!("Decoder failed: {}", e),
                    source: Some(Box::new(e)),
                })
            }
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| ClipFxError::Decode {
        reason: "stream does not declare a sample rate".to_string(),
        source: None,
    })?;
    let layout = channel_layout(channels.unwrap_or(1))?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, layout)?;

    Ok((buffer, sample_rate))
}

fn channel_layout(channels: usize) -> Result<ChannelLayout> {
    ChannelLayout::from_count(channels).ok_or_else(|| ClipFxError::UnsupportedFormat {
        format: format!("{}-channel audio (only mono/stereo supported)", channels),
    })
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decode_err = |e: hound::Error| ClipFxError::Decode {
        reason: format!("Failed to read {}-bit samples: {}", bits_per_sample, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_err),
        SampleFormat::Int => match bits_per_sample {
            // hound re-centres unsigned 8-bit data around zero
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_err),
            _ => Err(ClipFxError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

// ============================================================================
// Encode
// ============================================================================

/// Encode a buffer into the bytes of a container file
///
/// WAV output is 32-bit float so that `decode(encode(buf))` reproduces the
/// buffer bit for bit. MP3 and OGG are lossy; their samples are clamped to
/// [-1, 1] and quantised to 16 bits before encoding.
///
/// # Errors
/// * `UnsupportedFormat` - the format's encoder is not compiled in
/// * `Encode` - the encoder rejected the audio
pub fn encode(buffer: &AudioBuffer, sample_rate: u32, format: ExportFormat) -> Result<Vec<u8>> {
    if sample_rate == 0 {
        return Err(ClipFxError::invalid_param(
            "sample_rate",
            sample_rate,
            "a positive sample rate",
        ));
    }

    let bytes = match format {
        ExportFormat::Wav => encode_wav(buffer, sample_rate)?,
        ExportFormat::Mp3 => encode_mp3(buffer, sample_rate)?,
        ExportFormat::Ogg => encode_ogg(buffer, sample_rate)?,
    };

    info!(
        "Encoded {} samples x {} channel(s) as {} ({} bytes)",
        buffer.len(),
        buffer.channels(),
        format,
        bytes.len()
    );

    Ok(bytes)
}

fn encode_wav(buffer: &AudioBuffer, sample_rate: u32) -> Result<Vec<u8>> {
    let wav_err = |e: hound::Error| ClipFxError::Encode {
        format: "wav".to_string(),
        reason: e.to_string(),
    };

    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut output = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut output), spec).map_err(wav_err)?;
        for sample in buffer.to_interleaved() {
            writer.write_sample(sample).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;
    }

    Ok(output)
}

/// Clamp to [-1, 1] and scale to 16-bit PCM
#[cfg(any(feature = "mp3", feature = "ogg"))]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(feature = "mp3")]
fn encode_mp3(buffer: &AudioBuffer, sample_rate: u32) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};

    let mp3_err = |reason: String| ClipFxError::Encode {
        format: "mp3".to_string(),
        reason,
    };

    let mut builder = Builder::new().ok_or_else(|| mp3_err("LAME encoder init failed".into()))?;
    builder
        .set_num_channels(buffer.channels() as u8)
        .map_err(|e| mp3_err(format!("set channels failed: {:?}", e)))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| mp3_err(format!("set sample rate failed: {:?}", e)))?;
    builder
        .set_brate(Bitrate::Kbps192)
        .map_err(|e| mp3_err(format!("set bitrate failed: {:?}", e)))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| mp3_err(format!("set quality failed: {:?}", e)))?;
    let mut encoder = builder
        .build()
        .map_err(|e| mp3_err(format!("build failed: {:?}", e)))?;

    let left: Vec<i16> = buffer.channel(0).iter().map(|&s| to_i16(s)).collect();
    let mut mp3_output: Vec<u8> =
        Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(buffer.len()));

    let encoded = if buffer.is_stereo() {
        let right: Vec<i16> = buffer.channel(1).iter().map(|&s| to_i16(s)).collect();
        encoder.encode(
            DualPcm {
                left: &left,
                right: &right,
            },
            mp3_output.spare_capacity_mut(),
        )
    } else {
        encoder.encode(MonoPcm(&left), mp3_output.spare_capacity_mut())
    };
    let encoded_size = encoded.map_err(|e| mp3_err(format!("encode failed: {:?}", e)))?;
    // SAFETY: the encoder initialised `encoded_size` bytes of spare capacity
    unsafe {
        mp3_output.set_len(encoded_size);
    }

    mp3_output.reserve(7200);
    let flush_size = encoder
        .flush::<FlushNoGap>(mp3_output.spare_capacity_mut())
        .map_err(|e| mp3_err(format!("flush failed: {:?}", e)))?;
    // SAFETY: the encoder initialised `flush_size` bytes after the current length
    unsafe {
        mp3_output.set_len(mp3_output.len() + flush_size);
    }

    Ok(mp3_output)
}

#[cfg(not(feature = "mp3"))]
fn encode_mp3(_buffer: &AudioBuffer, _sample_rate: u32) -> Result<Vec<u8>> {
    Err(ClipFxError::UnsupportedFormat {
        format: "mp3 export (build with the 'mp3' feature)".to_string(),
    })
}

#[cfg(feature = "ogg")]
fn encode_ogg(buffer: &AudioBuffer, sample_rate: u32) -> Result<Vec<u8>> {
    use vorbis_encoder::Encoder;

    // libvorbis quality 0.5 is roughly 160 kbps for stereo
    const VORBIS_QUALITY: f32 = 0.5;

    let ogg_err = |reason: String| ClipFxError::Encode {
        format: "ogg".to_string(),
        reason,
    };

    let mut encoder = Encoder::new(buffer.channels() as u32, sample_rate as u64, VORBIS_QUALITY)
        .map_err(|e| ogg_err(format!("encoder init failed: {}", e)))?;

    let samples: Vec<i16> = buffer.to_interleaved().into_iter().map(to_i16).collect();
    let mut ogg_data = encoder
        .encode(&samples)
        .map_err(|e| ogg_err(format!("encode failed: {}", e)))?;
    let flushed = encoder
        .flush()
        .map_err(|e| ogg_err(format!("flush failed: {}", e)))?;
    ogg_data.extend(flushed);

    Ok(ogg_data)
}

#[cfg(not(feature = "ogg"))]
fn encode_ogg(_buffer: &AudioBuffer, _sample_rate: u32) -> Result<Vec<u8>> {
    Err(ClipFxError::UnsupportedFormat {
        format: "ogg export (build with the 'ogg' feature)".to_string(),
    })
}

// ============================================================================
// File helpers
// ============================================================================

/// Read and decode an audio file, using its extension as a probe hint
pub fn load_file(path: &Path) -> Result<(AudioBuffer, u32)> {
    let bytes = read_file(path)?;
    let hint = path.extension().and_then(|e| e.to_str());
    decode(&bytes, hint)
}

/// Encode a buffer in the format named by the path's extension and write it
pub fn save_file(path: &Path, buffer: &AudioBuffer, sample_rate: u32) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(path)?;
    let bytes = encode(buffer, sample_rate, format)?;
    std::fs::write(path, bytes)?;
    Ok(format)
}

/// Convert an audio file to the format implied by the output extension
pub fn convert_file(input: &Path, output: &Path) -> Result<ExportFormat> {
    let (buffer, sample_rate) = load_file(input)?;
    save_file(output, &buffer, sample_rate)
}

/// Read a whole file, mapping a missing path to `FileNotFound`
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClipFxError::FileNotFound {
                path: path.display().to_string(),
                source: Some(e),
            }
        } else {
            ClipFxError::Io(e)
        }
    })
}

// ============================================================================
// Test signals
// ============================================================================

/// Generate a mono sine wave
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `duration_secs` - Duration of the tone in seconds
/// * `sample_rate` - Sample rate in Hz
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    AudioBuffer::mono(sine(frequency, num_samples, sample_rate))
}

/// Generate a stereo buffer with a different sine in each channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    AudioBuffer::from_channels(vec![
        sine(freq_left, num_samples, sample_rate),
        sine(freq_right, num_samples, sample_rate),
    ])
    .unwrap_or_else(|_| AudioBuffer::new(num_samples, ChannelLayout::Stereo))
}

fn sine(frequency: f32, num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..num_samples)
        .map(|i| (angular_freq * i as f64).sin() as f32)
        .collect()
}
