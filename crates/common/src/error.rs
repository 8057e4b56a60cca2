//! Error types shared across Sheen crates.
//!
//! The render pipeline distinguishes source failures from encoder failures
//! so callers can report a precise reason. User cancellation is deliberately
//! absent: it is a terminal outcome, not an error.

use std::path::PathBuf;

/// Top-level error type for Sheen operations.
#[derive(Debug, thiserror::Error)]
pub enum SheenError {
    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Source has no video track: {path}")]
    NoVideoTrack { path: PathBuf },

    #[error("Encoder setup failed: {message}")]
    EncoderSetupFailed { message: String },

    #[error("Encoder write failed: {message}")]
    EncoderWriteFailed { message: String },

    #[error("An export is already running")]
    AlreadyExporting,

    #[error("Invalid export job: {message}")]
    InvalidJob { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SheenError.
pub type SheenResult<T> = Result<T, SheenError>;

impl SheenError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: msg.into(),
        }
    }

    pub fn encoder_setup(msg: impl Into<String>) -> Self {
        Self::EncoderSetupFailed {
            message: msg.into(),
        }
    }

    pub fn encoder_write(msg: impl Into<String>) -> Self {
        Self::EncoderWriteFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob {
            message: msg.into(),
        }
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this failure came from the media source side of the pipeline.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::NoVideoTrack { .. }
        )
    }

    /// Whether this failure came from the encoder side of the pipeline.
    pub fn is_encoder_error(&self) -> bool {
        matches!(
            self,
            Self::EncoderSetupFailed { .. } | Self::EncoderWriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SheenError::source_unavailable("gone").is_source_error());
        assert!(SheenError::NoVideoTrack {
            path: PathBuf::from("a.mp4")
        }
        .is_source_error());
        assert!(SheenError::encoder_write("pipe closed").is_encoder_error());
        assert!(!SheenError::AlreadyExporting.is_encoder_error());
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        let err = SheenError::encoder_setup("ffmpeg not found");
        assert_eq!(err.to_string(), "Encoder setup failed: ffmpeg not found");
    }
}
