//! Effect descriptions and recipes
//!
//! An [`Effect`] is one configured transform. Effects serialize as internally
//! tagged JSON objects, e.g. `{"type": "pan", "pan": -0.5}`, and a [`Recipe`]
//! is an ordered list of them.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::butterworth::FilterBand;
use super::delay::Delay;
use super::eq::ThreeBandEq;
use super::filter::{apply_filter_with_order, FILTER_ORDER};
use super::noise::NoiseReducer;
use super::pan::apply_panning;
use super::stretch::{apply_pitch_shift, apply_time_stretch, Stretcher};
use crate::engine::io::read_file;
use crate::engine::AudioBuffer;
use crate::error::{ClipFxError, Result};

/// Filter response selected by a filter effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lowpass => write!(f, "lowpass"),
            Self::Highpass => write!(f, "highpass"),
            Self::Bandpass => write!(f, "bandpass"),
        }
    }
}

/// A single corner frequency, or a `[low, high]` pair for band-pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cutoff {
    Single(f64),
    Band([f64; 2]),
}

fn default_filter_order() -> usize {
    FILTER_ORDER
}

/// One configured effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Constant-power pan, -1 (left) to 1 (right)
    Pan { pan: f32 },
    /// Pitch change in semitones, duration unchanged
    PitchShift { semitones: f64 },
    /// Speed change; 2.0 halves the duration
    TimeStretch { rate: f64 },
    Delay(Delay),
    Equalizer(ThreeBandEq),
    Filter {
        filter_type: FilterKind,
        cutoff: Cutoff,
        #[serde(default = "default_filter_order")]
        order: usize,
    },
    NoiseReduction(NoiseReducer),
}

impl Effect {
    /// Order-5 filter with the given response and cutoff
    pub fn filter(filter_type: FilterKind, cutoff: Cutoff) -> Self {
        Self::Filter {
            filter_type,
            cutoff,
            order: FILTER_ORDER,
        }
    }

    /// Short identifier, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pan { .. } => "pan",
            Self::PitchShift { .. } => "pitch_shift",
            Self::TimeStretch { .. } => "time_stretch",
            Self::Delay(_) => "delay",
            Self::Equalizer(_) => "equalizer",
            Self::Filter { .. } => "filter",
            Self::NoiseReduction(_) => "noise_reduction",
        }
    }

    /// Effects slow enough that callers should show progress
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Self::PitchShift { .. } | Self::TimeStretch { .. } | Self::NoiseReduction(_)
        )
    }

    /// Whether the effect may change the number of samples
    pub fn changes_length(&self) -> bool {
        matches!(self, Self::TimeStretch { .. })
    }

    /// Check parameters that do not depend on the sample rate
    ///
    /// Corner frequencies are checked against Nyquist when the effect is
    /// applied.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Pan { pan } => finite("pan", *pan as f64),
            Self::PitchShift { semitones } => finite("semitones", *semitones),
            Self::TimeStretch { rate } => {
                if rate.is_finite() && *rate > 0.0 {
                    Ok(())
                } else {
                    Err(ClipFxError::invalid_param("rate", rate, "a finite rate > 0"))
                }
            }
            Self::Delay(delay) => {
                if !delay.delay_ms.is_finite() || delay.delay_ms < 0.0 {
                    return Err(ClipFxError::invalid_param(
                        "delay_ms",
                        delay.delay_ms,
                        "a delay of 0 ms or more",
                    ));
                }
                finite("feedback", delay.feedback as f64)?;
                finite("mix", delay.mix as f64)
            }
            Self::Equalizer(eq) => {
                finite("bass_db", eq.bass_db as f64)?;
                finite("mid_db", eq.mid_db as f64)?;
                finite("treble_db", eq.treble_db as f64)
            }
            Self::Filter { order, .. } => {
                if *order == 0 {
                    return Err(ClipFxError::invalid_param("order", order, "an order >= 1"));
                }
                self.filter_band().map(|_| ())
            }
            Self::NoiseReduction(reducer) => {
                let factor = reducer.reduction_factor;
                if factor.is_finite() && factor >= 0.0 {
                    Ok(())
                } else {
                    Err(ClipFxError::invalid_param(
                        "reduction_factor",
                        factor,
                        "a finite factor >= 0",
                    ))
                }
            }
        }
    }

    fn filter_band(&self) -> Result<FilterBand> {
        let Self::Filter {
            filter_type,
            cutoff,
            ..
        } = self
        else {
            return Err(ClipFxError::invalid_param("type", self.name(), "filter"));
        };

        match (filter_type, cutoff) {
            (FilterKind::Lowpass, Cutoff::Single(hz)) => Ok(FilterBand::LowPass { cutoff_hz: *hz }),
            (FilterKind::Highpass, Cutoff::Single(hz)) => {
                Ok(FilterBand::HighPass { cutoff_hz: *hz })
            }
            (FilterKind::Bandpass, Cutoff::Band([low, high])) => Ok(FilterBand::BandPass {
                low_hz: *low,
                high_hz: *high,
            }),
            (FilterKind::Bandpass, Cutoff::Single(hz)) => Err(ClipFxError::invalid_param(
                "cutoff",
                hz,
                "a [low, high] pair for bandpass",
            )),
            (kind, Cutoff::Band(pair)) => Err(ClipFxError::invalid_param(
                "cutoff",
                format!("{:?}", pair),
                format!("a single frequency for {}", kind),
            )),
        }
    }

    /// Run the effect on a buffer, returning a new buffer
    ///
    /// The stretcher is only used by pitch shift and time stretch.
    pub fn apply(
        &self,
        buffer: &AudioBuffer,
        sample_rate: u32,
        stretcher: &dyn Stretcher,
    ) -> Result<AudioBuffer> {
        self.validate()?;
        match self {
            Self::Pan { pan } => Ok(apply_panning(buffer, sample_rate, *pan)),
            Self::PitchShift { semitones } => {
                apply_pitch_shift(buffer, sample_rate, *semitones, stretcher)
            }
            Self::TimeStretch { rate } => apply_time_stretch(buffer, sample_rate, *rate, stretcher),
            Self::Delay(delay) => delay.apply(buffer, sample_rate),
            Self::Equalizer(eq) => eq.apply(buffer, sample_rate),
            Self::Filter { order, .. } => {
                apply_filter_with_order(buffer, sample_rate, self.filter_band()?, *order)
            }
            Self::NoiseReduction(reducer) => reducer.apply(buffer, sample_rate),
        }
    }
}

fn finite(param: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ClipFxError::invalid_param(param, value, "a finite value"))
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pan { pan } => write!(f, "pan {:+.2}", pan),
            Self::PitchShift { semitones } => write!(f, "pitch shift {:+} st", semitones),
            Self::TimeStretch { rate } => write!(f, "time stretch x{}", rate),
            Self::Delay(d) => write!(
                f,
                "delay {} ms, feedback {}, mix {}",
                d.delay_ms, d.feedback, d.mix
            ),
            Self::Equalizer(eq) => write!(
                f,
                "eq bass {:+} dB, mid {:+} dB, treble {:+} dB",
                eq.bass_db, eq.mid_db, eq.treble_db
            ),
            Self::Filter {
                filter_type,
                cutoff,
                order,
            } => match cutoff {
                Cutoff::Single(hz) => write!(f, "{} {} Hz (order {})", filter_type, hz, order),
                Cutoff::Band([lo, hi]) => {
                    write!(f, "{} {}-{} Hz (order {})", filter_type, lo, hi, order)
                }
            },
            Self::NoiseReduction(r) => write!(f, "noise reduction x{}", r.reduction_factor),
        }
    }
}

// ============================================================================
// Recipes
// ============================================================================

/// An ordered chain of effects, applied first to last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Recipe {
    pub fn new(effects: Vec<Effect>) -> Self {
        Self { effects }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a recipe from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = read_file(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every effect, stopping at the first bad one
    pub fn validate(&self) -> Result<()> {
        self.effects.iter().try_for_each(Effect::validate)
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// A recipe using every effect once, for editing by hand
    pub fn template() -> Self {
        Self::new(vec![
            Effect::NoiseReduction(NoiseReducer::default()),
            Effect::filter(FilterKind::Highpass, Cutoff::Single(80.0)),
            Effect::Equalizer(ThreeBandEq::new(2.0, 0.0, -1.5)),
            Effect::PitchShift { semitones: 2.0 },
            Effect::TimeStretch { rate: 1.1 },
            Effect::Delay(Delay::default()),
            Effect::Pan { pan: -0.25 },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::stretch::PhaseVocoder;
    use crate::engine::io::generate_stereo_test_tone;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_parse_tagged_effects() {
        let recipe = Recipe::from_json(
            r#"{
                "effects": [
                    {"type": "pan", "pan": -0.5},
                    {"type": "delay", "delay_ms": 120},
                    {"type": "filter", "filter_type": "bandpass", "cutoff": [300, 3000]},
                    {"type": "filter", "filter_type": "lowpass", "cutoff": 1000},
                    {"type": "noise_reduction"},
                    {"type": "equalizer", "bass_db": 3.0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            recipe.effects,
            vec![
                Effect::Pan { pan: -0.5 },
                Effect::Delay(Delay::new(120.0, 0.5, 0.5)),
                Effect::filter(FilterKind::Bandpass, Cutoff::Band([300.0, 3000.0])),
                Effect::filter(FilterKind::Lowpass, Cutoff::Single(1000.0)),
                Effect::NoiseReduction(NoiseReducer::new(1.5)),
                Effect::Equalizer(ThreeBandEq::new(3.0, 0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_template_survives_json() {
        let template = Recipe::template();
        let parsed = Recipe::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(parsed, template);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Recipe::from_json(r#"{"effects": [{"type": "flanger"}]}"#).unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test_case(Effect::filter(FilterKind::Bandpass, Cutoff::Single(500.0)) ; "bandpass single")]
    #[test_case(Effect::filter(FilterKind::Lowpass, Cutoff::Band([1.0, 2.0])) ; "lowpass pair")]
    #[test_case(Effect::TimeStretch { rate: 0.0 } ; "zero rate")]
    #[test_case(Effect::Delay(Delay::new(-1.0, 0.5, 0.5)) ; "negative delay")]
    #[test_case(Effect::Pan { pan: f32::NAN } ; "nan pan")]
    fn test_invalid_effects(effect: Effect) {
        assert_eq!(effect.validate().unwrap_err().error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_apply_keeps_channel_count() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 0.2, 22050);
        let stretcher = PhaseVocoder::default();
        for effect in Recipe::template().effects {
            let out = effect.apply(&buffer, 22050, &stretcher).unwrap();
            assert_eq!(out.channels(), 2, "{}", effect);
            if !effect.changes_length() {
                assert_eq!(out.len(), buffer.len(), "{}", effect);
            }
        }
    }

    #[test]
    fn test_names_match_tags() {
        for effect in Recipe::template().effects {
            let value = serde_json::to_value(&effect).unwrap();
            assert_eq!(value["type"], effect.name());
        }
    }

    #[test]
    fn test_long_running_effects() {
        assert!(Effect::PitchShift { semitones: 1.0 }.is_long_running());
        assert!(Effect::NoiseReduction(NoiseReducer::default()).is_long_running());
        assert!(!Effect::Pan { pan: 0.0 }.is_long_running());
    }
}
