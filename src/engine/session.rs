//! Editing session
//!
//! A session owns the decoded clip twice: `original`, which is never modified
//! after load, and `current`, which every successful effect replaces. A failed
//! effect leaves `current` exactly as it was. Resetting copies `original`
//! back into `current`.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::buffer::{calculate_peak, calculate_rms, AudioBuffer};
use super::io::{decode, encode, read_file, ExportFormat};
use crate::dsp::{Effect, PhaseVocoder, Recipe, Stretcher};
use crate::error::{ClipFxError, Result};

/// One accepted change to the session
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Human-readable description
    pub label: String,
    /// The effect, when the change came from one
    pub effect: Option<Effect>,
    pub applied_at: DateTime<Utc>,
}

/// Snapshot of a session for display or JSON output
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub source_id: String,
    pub checksum: String,
    pub loaded_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub channels: usize,
    pub samples: usize,
    pub duration_secs: f64,
    pub original_duration_secs: f64,
    pub peak_db: f32,
    pub rms_db: f32,
    pub modified: bool,
    pub history: Vec<String>,
}

/// Original and current buffers of one loaded clip
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    source_id: String,
    checksum: String,
    loaded_at: DateTime<Utc>,
    sample_rate: u32,
    original: AudioBuffer,
    current: AudioBuffer,
    history: Vec<HistoryEntry>,
    stretcher: Box<dyn Stretcher>,
}

impl Session {
    /// Decode container bytes into a new session
    ///
    /// `source_id` names the clip (usually its file name); its extension is
    /// used as a decoder hint. The checksum is taken over the decoded samples,
    /// so it does not depend on the container.
    ///
    /// # Errors
    /// Decode errors from [`decode`]; nothing is created on failure.
    pub fn load(bytes: &[u8], source_id: impl Into<String>) -> Result<Self> {
        let source_id = source_id.into();
        let hint = Path::new(&source_id)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_owned);

        let (buffer, sample_rate) = decode(bytes, hint.as_deref())?;
        let checksum = sample_checksum(&buffer);
        Ok(Self::build(buffer, sample_rate, source_id, checksum))
    }

    /// Open an audio file as a new session
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = read_file(path)?;
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::load(&bytes, source_id)
    }

    /// Start a session from an already decoded buffer
    ///
    pub fn from_buffer(
        buffer: AudioBuffer,
        sample_rate: u32,
        source_id: impl Into<String>,
    ) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ClipFxError::invalid_param("sample_rate", 0, "a rate > 0 Hz"));
        }
        let checksum = sample_checksum(&buffer);
        Ok(Self::build(buffer, sample_rate, source_id.into(), checksum))
    }

    fn build(buffer: AudioBuffer, sample_rate: u32, source_id: String, checksum: String) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            source_id,
            checksum,
            loaded_at: Utc::now(),
            sample_rate,
            current: buffer.clone(),
            original: buffer,
            history: Vec::new(),
            stretcher: Box::new(PhaseVocoder::default()),
        };
        info!(
            "Session {} loaded '{}': {} ch, {} Hz, {:.2}s",
            session.id,
            session.source_id,
            session.original.channels(),
            sample_rate,
            session.original.duration_secs(sample_rate)
        );
        session
    }

    /// Use a different pitch/time-stretch algorithm
    pub fn with_stretcher(mut self, stretcher: Box<dyn Stretcher>) -> Self {
        self.stretcher = stretcher;
        self
    }

    // ========================================================================
    // Applying effects
    // ========================================================================

    /// Apply one effect to the current buffer
    ///
    /// On success the result replaces `current` and the effect is recorded;
    /// on failure the session is unchanged.
    pub fn apply(&mut self, effect: &Effect) -> Result<&AudioBuffer> {
        let label = effect.to_string();
        let stretcher = self.stretcher.as_ref();
        let result = Self::run(&label, effect.is_long_running(), || {
            effect.apply(&self.current, self.sample_rate, stretcher)
        })?;
        self.commit(label, Some(effect.clone()), result)
    }

    /// Apply an arbitrary buffer transform with replace-on-success semantics
    pub fn apply_transform<F>(&mut self, label: &str, transform: F) -> Result<&AudioBuffer>
    where
        F: FnOnce(&AudioBuffer, u32) -> Result<AudioBuffer>,
    {
        let result = transform(&self.current, self.sample_rate)?;
        self.commit(label.to_string(), None, result)
    }

    /// Apply every effect of a recipe in order
    ///
    /// Stops at the first failure. Effects applied before it stay applied.
    /// Returns how many effects were applied.
    pub fn apply_recipe(&mut self, recipe: &Recipe) -> Result<usize> {
        for (index, effect) in recipe.effects.iter().enumerate() {
            if let Err(e) = self.apply(effect) {
                warn!(
                    "Recipe stopped at effect {} of {} ({}): {}",
                    index + 1,
                    recipe.len(),
                    effect.name(),
                    e
                );
                return Err(e);
            }
        }
        Ok(recipe.len())
    }

    fn run<F>(label: &str, long_running: bool, job: F) -> Result<AudioBuffer>
    where
        F: FnOnce() -> Result<AudioBuffer>,
    {
        let started = Instant::now();
        if long_running {
            info!("Working: {}...", label);
        }
        let result = job();
        if long_running {
            info!("Finished {} in {:.2?}", label, started.elapsed());
        }
        result
    }

    fn commit(
        &mut self,
        label: String,
        effect: Option<Effect>,
        result: AudioBuffer,
    ) -> Result<&AudioBuffer> {
        if result.channels() != self.current.channels() {
            return Err(ClipFxError::ChannelMismatch {
                lengths: result.iter_channels().map(|c| c.len()).collect(),
            });
        }

        info!("Applied {}", label);
        self.current = result;
        self.history.push(HistoryEntry {
            label,
            effect,
            applied_at: Utc::now(),
        });
        Ok(&self.current)
    }

    /// Discard every change, restoring the original buffer
    pub fn reset(&mut self) {
        info!(
            "Session {} reset ({} change(s) discarded)",
            self.id,
            self.history.len()
        );
        self.current = self.original.clone();
        self.history.clear();
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Encode the current buffer; the session is unaffected by failures
    pub fn export(&self, format: ExportFormat) -> Result<Vec<u8>> {
        encode(&self.current, self.sample_rate, format)
    }

    /// Write the current buffer to a file, format taken from its extension
    pub fn save(&self, path: &Path) -> Result<ExportFormat> {
        let format = ExportFormat::from_path(path)?;
        std::fs::write(path, self.export(format)?)?;
        info!("Exported {} to {}", format, path.display());
        Ok(format)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// SHA-256 of the loaded source, lowercase hex
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn original(&self) -> &AudioBuffer {
        &self.original
    }

    pub fn current(&self) -> &AudioBuffer {
        &self.current
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// The applied effects as a recipe that reproduces `current` from `original`
    ///
    /// Changes made through [`Session::apply_transform`] are not included.
    pub fn recipe(&self) -> Recipe {
        Recipe::new(
            self.history
                .iter()
                .filter_map(|entry| entry.effect.clone())
                .collect(),
        )
    }

    /// Whether `current` differs from `original`
    pub fn is_modified(&self) -> bool {
        self.current != self.original
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            source_id: self.source_id.clone(),
            checksum: self.checksum.clone(),
            loaded_at: self.loaded_at,
            sample_rate: self.sample_rate,
            channels: self.current.channels(),
            samples: self.current.len(),
            duration_secs: self.current.duration_secs(self.sample_rate),
            original_duration_secs: self.original.duration_secs(self.sample_rate),
            peak_db: calculate_peak(&self.current),
            rms_db: calculate_rms(&self.current),
            modified: self.is_modified(),
            history: self.history.iter().map(|h| h.label.clone()).collect(),
        }
    }
}

/// SHA-256 over the little-endian bytes of the interleaved samples
fn sample_checksum(buffer: &AudioBuffer) -> String {
    let mut hasher = Sha256::new();
    for sample in buffer.to_interleaved() {
        hasher.update(sample.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Cutoff, Delay, FilterKind};
    use crate::engine::io::{generate_stereo_test_tone, generate_test_tone};

    const SR: u32 = 22050;

    fn stereo_session() -> Session {
        let buffer = generate_stereo_test_tone(440.0, 660.0, 0.25, SR);
        Session::from_buffer(buffer, SR, "tones.wav").unwrap()
    }

    #[test]
    fn test_load_from_wav_bytes() {
        let buffer = generate_test_tone(440.0, 0.1, SR);
        let bytes = encode(&buffer, SR, ExportFormat::Wav).unwrap();
        let session = Session::load(&bytes, "tone.wav").unwrap();

        assert_eq!(session.sample_rate(), SR);
        assert_eq!(session.current(), &buffer);
        assert_eq!(session.original(), session.current());
        assert_eq!(session.checksum().len(), 64);
        assert!(!session.is_modified());
    }

    #[test]
    fn test_checksum_ignores_container() {
        let buffer = generate_stereo_test_tone(440.0, 660.0, 0.1, SR);
        let bytes = encode(&buffer, SR, ExportFormat::Wav).unwrap();

        let loaded = Session::load(&bytes, "tones.wav").unwrap();
        let direct = Session::from_buffer(buffer, SR, "mem").unwrap();
        assert_eq!(loaded.checksum(), direct.checksum());
    }

    #[test]
    fn test_load_rejects_zero_sample_rate() {
        let buffer = generate_test_tone(440.0, 0.01, SR);
        let mut bytes = encode(&buffer, SR, ExportFormat::Wav).unwrap();
        bytes[24..28].fill(0);

        let err = Session::load(&bytes, "broken.wav").unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_load_failure_creates_nothing() {
        let err = Session::load(b"not audio at all", "junk.wav").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_effects_accumulate() {
        let mut session = stereo_session();
        session.apply(&Effect::Pan { pan: -1.0 }).unwrap();
        session.apply(&Effect::Delay(Delay::default())).unwrap();

        assert_eq!(session.history().len(), 2);
        assert!(session.is_modified());
        assert!(session.current().channel(1).iter().all(|s| s.abs() < 1e-6));
        assert_eq!(session.recipe().len(), 2);
    }

    #[test]
    fn test_failed_effect_leaves_current_untouched() {
        let mut session = stereo_session();
        session.apply(&Effect::Pan { pan: 0.5 }).unwrap();
        let before = session.current().clone();

        let bad = Effect::filter(FilterKind::Bandpass, Cutoff::Band([3000.0, 300.0]));
        assert!(session.apply(&bad).is_err());

        assert_eq!(session.current(), &before);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_reset_restores_original() {
        let mut session = stereo_session();
        session.apply(&Effect::TimeStretch { rate: 2.0 }).unwrap();
        assert_ne!(session.current().len(), session.original().len());

        session.reset();
        assert_eq!(session.current(), session.original());
        assert!(session.history().is_empty());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_recipe_stops_at_first_failure() {
        let mut session = stereo_session();
        let recipe = Recipe::new(vec![
            Effect::Pan { pan: 1.0 },
            Effect::TimeStretch { rate: -1.0 },
            Effect::Pan { pan: -1.0 },
        ]);

        assert!(session.apply_recipe(&recipe).is_err());
        assert_eq!(session.history().len(), 1);
        // the first pan survived, the last never ran
        assert!(session.current().channel(0).iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_transform_changing_channels_rejected() {
        let mut session = stereo_session();
        let err = session
            .apply_transform("downmix", |buffer, _| {
                Ok(AudioBuffer::mono(buffer.channel(0).to_vec()))
            })
            .unwrap_err();
        assert_eq!(err.error_code(), "CHANNEL_MISMATCH");
        assert_eq!(session.current().channels(), 2);
    }

    #[test]
    fn test_export_wav_round_trip() {
        let mut session = stereo_session();
        session.apply(&Effect::Pan { pan: 0.25 }).unwrap();
        let bytes = session.export(ExportFormat::Wav).unwrap();
        let (decoded, sr) = decode(&bytes, Some("wav")).unwrap();

        assert_eq!(sr, SR);
        assert_eq!(&decoded, session.current());
    }

    #[test]
    fn test_summary() {
        let mut session = stereo_session();
        session.apply(&Effect::Pan { pan: 0.0 }).unwrap();
        let summary = session.summary();

        assert_eq!(summary.channels, 2);
        assert_eq!(summary.sample_rate, SR);
        assert!(summary.modified);
        assert_eq!(summary.history, vec!["pan +0.00".to_string()]);
        assert!(serde_json::to_string(&summary).is_ok());
    }
}
