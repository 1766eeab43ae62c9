//! Error taxonomy for the capture → transcode → upload → poll pipeline.
//!
//! Capture and transcode errors indicate a local/input problem and abort the
//! workflow immediately. Of the remote errors, only the "not ready yet"
//! polling condition is ever retried (inside `JobClient::await_result`); all
//! other errors are terminal on first occurrence.

use thiserror::Error;

use crate::capture::AudioAsset;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Device permission denied, no device found, device busy, or the device
    /// disconnected mid-recording. On disconnection, `partial` carries
    /// whatever audio was captured before the device went away; the caller
    /// decides whether to accept it.
    #[error("capture device unavailable: {reason}")]
    DeviceUnavailable {
        reason: String,
        partial: Option<AudioAsset>,
    },

    #[error("recording produced no audio data")]
    EmptyRecording,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt audio data: {0}")]
    CorruptAudio(String),

    /// The server rejected the upload (bad request, size, or format).
    /// Non-retryable.
    #[error("server rejected the audio upload: {0}")]
    UploadRejected(String),

    /// Polling exhausted its attempt budget while the result was still not
    /// ready. Likely an overloaded server or very long audio.
    #[error("processing took too long: {0}")]
    ResultTimeout(String),

    /// The server reported a hard failure distinct from "not ready yet".
    #[error("remote processing failed: {0}")]
    RemoteProcessingError(String),

    #[error("could not reach server: {0}")]
    Unreachable(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Coarse error classification for terminal reports, mirroring the error
/// taxonomy without dragging payloads along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    EmptyRecording,
    InvalidState,
    UnsupportedFormat,
    CorruptAudio,
    UploadRejected,
    ResultTimeout,
    RemoteProcessingError,
    Unreachable,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DeviceUnavailable { .. } => ErrorKind::DeviceUnavailable,
            PipelineError::EmptyRecording => ErrorKind::EmptyRecording,
            PipelineError::InvalidState(_) => ErrorKind::InvalidState,
            PipelineError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            PipelineError::CorruptAudio(_) => ErrorKind::CorruptAudio,
            PipelineError::UploadRejected(_) => ErrorKind::UploadRejected,
            PipelineError::ResultTimeout(_) => ErrorKind::ResultTimeout,
            PipelineError::RemoteProcessingError(_) => ErrorKind::RemoteProcessingError,
            PipelineError::Unreachable(_) => ErrorKind::Unreachable,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = PipelineError::UploadRejected("too large".into());
        assert_eq!(err.kind(), ErrorKind::UploadRejected);
        assert_eq!(PipelineError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn display_distinguishes_timeout_from_hard_failure() {
        let timeout = PipelineError::ResultTimeout("15 attempts over 98s".into());
        let hard = PipelineError::Unreachable("connection refused".into());
        assert!(timeout.to_string().contains("took too long"));
        assert!(hard.to_string().contains("could not reach server"));
    }
}
