//! DSP Effects Library
//!
//! Offline, whole-buffer transforms. Every effect takes a buffer and a sample
//! rate and returns a new buffer; inputs are never modified. Per-channel
//! effects are written against a single channel and lifted through
//! [`dispatch`].

pub mod butterworth;
pub mod delay;
pub mod dispatch;
pub mod effect;
pub mod eq;
pub mod filter;
pub mod noise;
pub mod pan;
pub mod stft;
pub mod stretch;

pub use butterworth::{BiquadCoeffs, FilterBand, SosFilter};
pub use delay::{apply_delay, Delay};
pub use dispatch::{map_channels, try_map_channels};
pub use effect::{Cutoff, Effect, FilterKind, Recipe};
pub use eq::{apply_eq, ThreeBandEq};
pub use filter::{apply_filter, apply_filter_with_order, FILTER_ORDER};
pub use noise::{reduce_noise, NoiseReducer, DEFAULT_REDUCTION_FACTOR};
pub use pan::{apply_panning, pan_gains};
pub use stft::Stft;
pub use stretch::{
    apply_pitch_shift, apply_time_stretch, pitch_shift, time_stretch, PhaseVocoder, Stretcher,
};
