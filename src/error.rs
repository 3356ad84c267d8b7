//! Error handling for fxstudio
//!
//! All errors carry an error code and recovery suggestions so a front end can
//! surface them without matching on variants.

use thiserror::Error;

/// Result type alias for fxstudio operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// Main error type for fxstudio operations
#[derive(Error, Debug)]
pub enum StudioError {
    // Load Errors
    #[error("Invalid audio data: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Session Errors
    #[error("No audio loaded")]
    NoAudioLoaded,

    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: String },

    // Rendering Errors
    #[error("Offline render failed: {reason}")]
    RenderFailure { reason: String },

    #[error("Audio device error: {reason}")]
    Device { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StudioError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StudioError::InvalidAudio { .. } => "INVALID_AUDIO",
            StudioError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            StudioError::NoAudioLoaded => "NO_AUDIO_LOADED",
            StudioError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            StudioError::RenderFailure { .. } => "RENDER_FAILURE",
            StudioError::Device { .. } => "DEVICE_ERROR",
            StudioError::InvalidConfig { .. } => "INVALID_CONFIG",
            StudioError::Io(_) => "IO_ERROR",
            StudioError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the engine in a usable state; the caller can
    /// retry with different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StudioError::InvalidAudio { .. }
                | StudioError::UnsupportedFormat { .. }
                | StudioError::NoAudioLoaded
                | StudioError::UnknownParameter { .. }
                | StudioError::RenderFailure { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StudioError::InvalidAudio { .. } => vec![
                "Check the file plays in another application",
                "Re-export the file as PCM WAV",
            ],
            StudioError::UnsupportedFormat { .. } => vec![
                "Convert to 8, 16, 24 or 32-bit PCM WAV, or 32-bit float WAV",
            ],
            StudioError::NoAudioLoaded => vec!["Load an audio file before playing or exporting"],
            StudioError::UnknownParameter { .. } => vec![
                "Valid parameters: volume, bass, mid, treble, gain, reverb, delay, \
                 echoFeedback, distortion, playbackRate, pitch",
            ],
            StudioError::RenderFailure { .. } => vec![
                "The effect settings may be too extreme",
                "Try lowering echoFeedback below 1.0",
            ],
            StudioError::Device { .. } => vec![
                "Check that an output device is connected",
                "Use the null output for headless rendering",
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
        assert_eq!(StudioError::NoAudioLoaded.error_code(), "NO_AUDIO_LOADED");
        let err = StudioError::RenderFailure {
            reason: "nan".to_string(),
        };
        assert_eq!(err.error_code(), "RENDER_FAILURE");
    }

    #[test]
    fn test_no_audio_message() {
        assert_eq!(StudioError::NoAudioLoaded.to_string(), "No audio loaded");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = StudioError::UnknownParameter {
            name: "wobble".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
        assert!(!StudioError::Device {
            reason: "gone".to_string()
        }
        .is_recoverable());
    }
}
