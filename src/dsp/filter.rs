//! Butterworth filter effect
//!
//! Low-pass, high-pass or band-pass filtering of every channel. The filter is
//! causal, so the output carries the filter's group delay; nothing is
//! normalized afterwards.

use log::info;

use super::butterworth::{FilterBand, SosFilter};
use super::dispatch::map_channels;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Order used by the filter effect
pub const FILTER_ORDER: usize = 5;

/// Apply an order-5 Butterworth filter to every channel
///
/// # Errors
/// `InvalidParameter` when a corner frequency is not strictly between 0 and
/// Nyquist, or a band-pass low corner is not below the high corner.
pub fn apply_filter(buffer: &AudioBuffer, sample_rate: u32, band: FilterBand) -> Result<AudioBuffer> {
    apply_filter_with_order(buffer, sample_rate, band, FILTER_ORDER)
}

/// Apply a Butterworth filter of the given order to every channel
pub fn apply_filter_with_order(
    buffer: &AudioBuffer,
    sample_rate: u32,
    band: FilterBand,
    order: usize,
) -> Result<AudioBuffer> {
    let filter = SosFilter::butterworth(order, band, sample_rate)?;
    info!("Filter: {:?}, order {}", band, order);

    map_channels(buffer, |channel| filter.filter(channel))
}
