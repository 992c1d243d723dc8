//! clipfx - Offline Audio Clip Effects
//!
//! Load a mono or stereo clip, stack effects on it, inspect it and export it.
//!
//! # Architecture
//!
//! - [`engine`]: the audio buffer, codec I/O and the editing [`engine::Session`]
//!   that keeps the original clip next to the current result
//! - [`dsp`]: pure, whole-buffer effects (pan, filter, EQ, delay, pitch shift,
//!   time stretch, noise reduction) and JSON recipes that chain them
//! - [`analysis`]: waveform, spectrum and spectrogram plot data
//! - [`cli`]: the `clipfx` command-line front end

pub mod analysis;
pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;

pub use error::{ClipFxError, Result};
