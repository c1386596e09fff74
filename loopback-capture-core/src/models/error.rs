use thiserror::Error;

use super::format::SampleFormat;

/// Errors that can occur while discovering devices, capturing, converting
/// or writing audio.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("cannot enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("no device found: {0}")]
    DeviceNotFound(String),

    #[error("audio client failed: {0}")]
    AudioClient(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(SampleFormat),

    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: SampleFormat, to: SampleFormat },

    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    #[error("cannot open output: {0}")]
    SinkOpen(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The reader on the other end of the output went away.
    #[error("output closed: {0}")]
    SinkClosed(String),

    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl CaptureError {
    /// Re-tags any failure raised while negotiating a client as `AudioClient`.
    pub(crate) fn into_audio_client(self) -> Self {
        match self {
            e @ CaptureError::AudioClient(_) => e,
            other => CaptureError::AudioClient(other.to_string()),
        }
    }

    /// Re-tags any failure raised while draining packets as `Capture`.
    pub(crate) fn into_capture(self) -> Self {
        match self {
            e @ CaptureError::Capture(_) => e,
            other => CaptureError::Capture(other.to_string()),
        }
    }

    pub(crate) fn into_enumeration(self) -> Self {
        match self {
            e @ CaptureError::DeviceEnumeration(_) => e,
            other => CaptureError::DeviceEnumeration(other.to_string()),
        }
    }
}
