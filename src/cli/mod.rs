//! CLI Module
//!
//! Command-line front end: load a clip, run effects over it, export it.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::{Cutoff, Delay, Effect, FilterKind, NoiseReducer, ThreeBandEq};
use crate::engine::ExportFormat;

/// clipfx - offline audio clip effects
#[derive(Parser, Debug)]
#[command(name = "clipfx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show format, duration and levels of an audio file
    Info {
        input: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply effects to an audio file and export the result
    Apply {
        input: PathBuf,

        /// Output file; the format comes from its extension unless --format is given
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (wav, mp3, ogg)
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// JSON recipe applied before any inline effects
        #[arg(short, long)]
        recipe: Option<PathBuf>,

        #[command(flatten)]
        effects: EffectArgs,
    },

    /// Print waveform, spectrum and spectrogram data
    Analyze {
        input: PathBuf,

        /// Print the full plot data as JSON
        #[arg(long)]
        json: bool,

        /// Maximum waveform points in JSON output
        #[arg(long, default_value_t = 2000)]
        max_points: usize,
    },

    /// Convert an audio file to the format implied by the output extension
    Convert { input: PathBuf, output: PathBuf },

    /// Print an example recipe
    #[command(name = "recipe-template")]
    RecipeTemplate,
}

/// Inline effects, applied in the order listed here
#[derive(Args, Debug, Default, Clone)]
pub struct EffectArgs {
    /// Spectral gate noise reduction
    #[arg(long)]
    pub denoise: bool,

    /// Noise gate threshold multiplier
    #[arg(long, default_value_t = crate::dsp::DEFAULT_REDUCTION_FACTOR, requires = "denoise")]
    pub reduction_factor: f32,

    /// Low-pass cutoff in Hz
    #[arg(long, value_name = "HZ", conflicts_with_all = ["highpass", "bandpass"])]
    pub lowpass: Option<f64>,

    /// High-pass cutoff in Hz
    #[arg(long, value_name = "HZ", conflicts_with = "bandpass")]
    pub highpass: Option<f64>,

    /// Band-pass corners in Hz
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"])]
    pub bandpass: Option<Vec<f64>>,

    /// Bass gain in dB
    #[arg(long, allow_negative_numbers = true)]
    pub bass: Option<f32>,

    /// Mid gain in dB
    #[arg(long, allow_negative_numbers = true)]
    pub mid: Option<f32>,

    /// Treble gain in dB
    #[arg(long, allow_negative_numbers = true)]
    pub treble: Option<f32>,

    /// Pitch shift in semitones
    #[arg(long, allow_negative_numbers = true)]
    pub pitch: Option<f64>,

    /// Time stretch rate (2.0 = twice as fast)
    #[arg(long)]
    pub stretch: Option<f64>,

    /// Delay time in milliseconds
    #[arg(long)]
    pub delay_ms: Option<f32>,

    /// Delay feedback
    #[arg(long, default_value_t = 0.5, requires = "delay_ms")]
    pub feedback: f32,

    /// Delay wet/dry mix
    #[arg(long, default_value_t = 0.5, requires = "delay_ms")]
    pub mix: f32,

    /// Stereo pan, -1 (left) to 1 (right)
    #[arg(long, allow_negative_numbers = true)]
    pub pan: Option<f32>,
}

impl EffectArgs {
    /// The requested effects in application order
    pub fn to_effects(&self) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.denoise {
            effects.push(Effect::NoiseReduction(NoiseReducer::new(self.reduction_factor)));
        }

        if let Some(hz) = self.lowpass {
            effects.push(Effect::filter(FilterKind::Lowpass, Cutoff::Single(hz)));
        }
        if let Some(hz) = self.highpass {
            effects.push(Effect::filter(FilterKind::Highpass, Cutoff::Single(hz)));
        }
        if let Some([low, high]) = self.bandpass.as_deref() {
            effects.push(Effect::filter(FilterKind::Bandpass, Cutoff::Band([*low, *high])));
        }

        if self.bass.is_some() || self.mid.is_some() || self.treble.is_some() {
            effects.push(Effect::Equalizer(ThreeBandEq::new(
                self.bass.unwrap_or(0.0),
                self.mid.unwrap_or(0.0),
                self.treble.unwrap_or(0.0),
            )));
        }

        if let Some(semitones) = self.pitch {
            effects.push(Effect::PitchShift { semitones });
        }
        if let Some(rate) = self.stretch {
            effects.push(Effect::TimeStretch { rate });
        }
        if let Some(delay_ms) = self.delay_ms {
            effects.push(Effect::Delay(Delay::new(delay_ms, self.feedback, self.mix)));
        }
        if let Some(pan) = self.pan {
            effects.push(Effect::Pan { pan });
        }

        effects
    }
}
