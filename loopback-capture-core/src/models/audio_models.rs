use serde::Serialize;

use super::format::{SampleFormat, WaveFormatDescriptor};

/// Snapshot of a render device and its native mix format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_type: SampleFormat,
}

impl DeviceInfo {
    pub fn from_descriptor(name: impl Into<String>, format: &WaveFormatDescriptor) -> Self {
        Self {
            name: name.into(),
            sample_rate: format.sample_rate(),
            channels: format.channels(),
            bits_per_sample: format.bits_per_sample(),
            data_type: format.classify(),
        }
    }
}

/// How a requested device name is compared against friendly names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameMatch {
    /// Whole-name, case-sensitive equality.
    #[default]
    Exact,
    /// Case-insensitive substring match.
    Partial,
}
