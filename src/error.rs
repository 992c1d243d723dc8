//! Error handling for clipfx
//!
//! Every error carries a stable code and, where it helps, recovery suggestions
//! the orchestrator can surface next to the message.

use thiserror::Error;

/// Result type alias for clipfx operations
pub type Result<T> = std::result::Result<T, ClipFxError>;

/// Main error type for clipfx operations
#[derive(Error, Debug)]
pub enum ClipFxError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Decode Errors
    #[error("Could not decode audio: {reason}")]
    Decode {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Configuration Errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Processing Errors
    #[error("Channel length mismatch after processing: {lengths:?}")]
    ChannelMismatch { lengths: Vec<usize> },

    // Encode Errors
    #[error("Could not encode {format}: {reason}")]
    Encode { format: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClipFxError {
    /// Shorthand for a configuration error on a single parameter
    pub fn invalid_param(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        ClipFxError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ClipFxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ClipFxError::Decode { .. } => "DECODE_ERROR",
            ClipFxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ClipFxError::EmptyAudio => "EMPTY_AUDIO",
            ClipFxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ClipFxError::ChannelMismatch { .. } => "CHANNEL_MISMATCH",
            ClipFxError::Encode { .. } => "ENCODE_ERROR",
            ClipFxError::Io(_) => "IO_ERROR",
            ClipFxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the session untouched, so the user can adjust
    /// the input or parameters and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClipFxError::FileNotFound { .. }
                | ClipFxError::Decode { .. }
                | ClipFxError::UnsupportedFormat { .. }
                | ClipFxError::EmptyAudio
                | ClipFxError::InvalidParameter { .. }
                | ClipFxError::Encode { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ClipFxError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            ClipFxError::Decode { .. } => vec![
                "Check if the file plays in another application",
                "The file may be corrupted - try re-exporting from source",
                "Try converting the file to WAV format first",
            ],
            ClipFxError::UnsupportedFormat { .. } => vec![
                "Supported input formats: WAV, MP3, FLAC, OGG (mono or stereo)",
                "Supported export formats: WAV, MP3, OGG",
            ],
            ClipFxError::InvalidParameter { .. } => vec![
                "Cutoff frequencies must lie strictly between 0 Hz and half the sample rate",
                "For band-pass filters the low cutoff must be below the high cutoff",
            ],
            ClipFxError::Encode { .. } => vec![
                "Export as WAV, which is always available",
                "Rebuild with the 'mp3' or 'ogg' feature for lossy export",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ClipFxError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(ClipFxError::EmptyAudio.error_code(), "EMPTY_AUDIO");
    }

    #[test]
    fn test_invalid_param_message() {
        let err = ClipFxError::invalid_param("cutoff_hz", 30000.0, "0 < cutoff < 22050 Hz");
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert!(err.to_string().contains("cutoff_hz"));
        assert!(err.to_string().contains("30000"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = ClipFxError::Decode {
            reason: "bad header".to_string(),
            source: None,
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());

        let err = ClipFxError::ChannelMismatch {
            lengths: vec![10, 11],
        };
        assert!(!err.is_recoverable());
    }
}
