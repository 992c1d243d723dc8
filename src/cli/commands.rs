//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{info, warn};

use super::EffectArgs;
use crate::analysis::{spectrogram, spectrum, PlotData};
use crate::dsp::Recipe;
use crate::engine::buffer::{calculate_peak, calculate_rms};
use crate::engine::{convert_file, ExportFormat, Session};
use crate::error::Result;

/// Print format, duration and levels of an audio file.
pub fn show_info(input: &Path, json: bool) -> Result<()> {
    info!("Reading: {}", input.display());

    let session = Session::open(input)?;
    let summary = session.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File:        {}", summary.source_id);
    println!("Channels:    {}", summary.channels);
    println!("Sample rate: {} Hz", summary.sample_rate);
    println!("Samples:     {}", summary.samples);
    println!("Duration:    {:.3} s", summary.duration_secs);
    println!("Peak:        {:.2} dBFS", summary.peak_db);
    println!("RMS:         {:.2} dBFS", summary.rms_db);
    println!("SHA-256:     {}", summary.checksum);

    Ok(())
}

/// Load a file, apply a recipe and inline effects, then export.
pub fn apply(
    input: &Path,
    output: &Path,
    format: Option<ExportFormat>,
    recipe_path: Option<&Path>,
    effects: &EffectArgs,
) -> Result<()> {
    // fail on a bad recipe or format before decoding anything
    let mut recipe = match recipe_path {
        Some(path) => {
            info!("Loading recipe: {}", path.display());
            Recipe::load(path)?
        }
        None => Recipe::default(),
    };
    recipe.effects.extend(effects.to_effects());
    recipe.validate()?;

    let format = match format {
        Some(format) => format,
        None => ExportFormat::from_path(output)?,
    };

    if recipe.is_empty() {
        warn!("No effects requested, exporting the input unchanged");
    }
    if !format.is_lossless() {
        info!("{} export is lossy", format);
    }

    let mut session = Session::open(input)?;
    let applied = session.apply_recipe(&recipe)?;

    let bytes = session.export(format)?;
    std::fs::write(output, bytes)?;

    println!(
        "Applied {} effect(s) to {}",
        applied,
        session.source_id()
    );
    for entry in session.history() {
        println!("  - {}", entry.label);
    }
    println!(
        "Exported {} ({:.3} s, {}) to {}",
        format.to_string().to_uppercase(),
        session.current().duration_secs(session.sample_rate()),
        if session.current().is_stereo() { "stereo" } else { "mono" },
        output.display()
    );

    Ok(())
}

/// Print a spectral summary, or the full plot data as JSON.
pub fn analyze(input: &Path, json: bool, max_points: usize) -> Result<()> {
    info!("Analyzing: {}", input.display());

    let session = Session::open(input)?;
    let buffer = session.current();
    let sample_rate = session.sample_rate();

    if json {
        let mut plot = PlotData::new(buffer, sample_rate);
        plot.waveform = plot.waveform.decimate(max_points);
        println!("{}", serde_json::to_string(&plot)?);
        return Ok(());
    }

    let spec = spectrum(buffer, sample_rate);
    let sg = spectrogram(buffer, sample_rate);

    println!("File:              {}", session.source_id());
    println!("Peak level:        {:.2} dBFS", calculate_peak(buffer));
    println!("RMS level:         {:.2} dBFS", calculate_rms(buffer));
    match spec.peak_frequency() {
        Some(freq) => println!("Dominant freq:     {:.1} Hz", freq),
        None => println!("Dominant freq:     n/a"),
    }
    println!("Spectral centroid: {:.1} Hz", spec.centroid());
    println!(
        "Spectrogram:       {} frames x {} bins",
        sg.times.len(),
        sg.frequencies.len()
    );

    Ok(())
}

/// Convert between audio formats.
pub fn convert(input: &Path, output: &Path) -> Result<()> {
    info!("Converting {} -> {}", input.display(), output.display());

    let format = convert_file(input, output)?;
    println!("Converted to {}: {}", format, output.display());

    Ok(())
}

/// Print the example recipe.
pub fn recipe_template() -> Result<()> {
    println!("{}", Recipe::template().to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{generate_stereo_test_tone, load_file, save_file};
    use tempfile::tempdir;

    #[test]
    fn test_apply_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        save_file(&input, &generate_stereo_test_tone(440.0, 880.0, 0.2, 22050), 22050).unwrap();

        let effects = EffectArgs {
            pan: Some(-1.0),
            ..Default::default()
        };
        apply(&input, &output, None, None, &effects).unwrap();

        let (buffer, sr) = load_file(&output).unwrap();
        assert_eq!(sr, 22050);
        assert!(buffer.channel(1).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_apply_with_recipe_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let recipe = dir.path().join("recipe.json");
        save_file(&input, &generate_stereo_test_tone(440.0, 880.0, 0.2, 22050), 22050).unwrap();
        std::fs::write(&recipe, r#"{"effects": [{"type": "time_stretch", "rate": 2.0}]}"#)
            .unwrap();

        apply(&input, &output, None, Some(&recipe), &EffectArgs::default()).unwrap();

        let (buffer, _) = load_file(&output).unwrap();
        assert_eq!(buffer.len(), 2205);
    }

    #[test]
    fn test_bad_recipe_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        let recipe = dir.path().join("recipe.json");
        save_file(&input, &generate_stereo_test_tone(440.0, 880.0, 0.1, 22050), 22050).unwrap();
        std::fs::write(&recipe, r#"{"effects": [{"type": "time_stretch", "rate": 0}]}"#).unwrap();

        assert!(apply(&input, &output, None, Some(&recipe), &EffectArgs::default()).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input() {
        let err = show_info(Path::new("/definitely/not/here.wav"), false).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
