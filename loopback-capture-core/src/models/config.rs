use std::time::Duration;

use super::audio_models::NameMatch;
use super::format::SampleFormat;

/// Ring-buffer capacity requested when none is configured, in frames.
pub const DEFAULT_RING_CAPACITY_FRAMES: usize = 16384;

/// Configuration for a capture run.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    /// Friendly name of the render device; empty selects the default device.
    pub device_name: String,

    /// How `device_name` is matched (default: exact).
    pub name_match: NameMatch,

    /// Shared ring-buffer capacity in frames (default: 16384).
    pub ring_capacity_frames: usize,

    /// Sample format written to WAV output (default: 16-bit signed).
    pub output_format: SampleFormat,

    /// Pause between polls that returned no data.
    pub poll_interval: Duration,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.ring_capacity_frames == 0 {
            return Err("ring capacity must be positive".into());
        }
        if !matches!(self.output_format, SampleFormat::UnsignedInt8 | SampleFormat::SignedInt16) {
            return Err(format!("unsupported output format: {}", self.output_format));
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            name_match: NameMatch::Exact,
            ring_capacity_frames: DEFAULT_RING_CAPACITY_FRAMES,
            output_format: SampleFormat::SignedInt16,
            poll_interval: Duration::from_millis(5),
        }
    }
}
