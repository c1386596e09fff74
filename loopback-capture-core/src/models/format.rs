//! Sample representations and native format descriptors.
//!
//! A render endpoint reports its mix format either as a legacy descriptor
//! (a coarse tag plus bit depth) or as an extensible descriptor carrying a
//! sub-format GUID. The two shapes have different classification rules, so
//! they are kept as separate variants rather than one reinterpreted struct.

use std::fmt;

use serde::Serialize;

/// Format tag for linear PCM in a legacy descriptor.
pub const WAVE_FORMAT_PCM: u16 = 0x0001;

/// Format tag for IEEE float in a legacy descriptor.
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;

/// Format tag marking a descriptor as extensible.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// `KSDATAFORMAT_SUBTYPE_PCM` as a big-endian GUID value.
pub const SUBTYPE_PCM: u128 = 0x00000001_0000_0010_8000_00aa00389b71;

/// `KSDATAFORMAT_SUBTYPE_IEEE_FLOAT` as a big-endian GUID value.
pub const SUBTYPE_IEEE_FLOAT: u128 = 0x00000003_0000_0010_8000_00aa00389b71;

/// PCM sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SampleFormat {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "pcm_8u")]
    UnsignedInt8,
    #[serde(rename = "pcm_s16")]
    SignedInt16,
    #[serde(rename = "pcm_f32")]
    Float32,
}

impl SampleFormat {
    /// Bytes per sample.
    ///
    /// `Unknown` reports 1 so size arithmetic never divides by zero; it does
    /// not describe the real sample width.
    pub fn byte_width(self) -> usize {
        match self {
            SampleFormat::Unknown | SampleFormat::UnsignedInt8 => 1,
            SampleFormat::SignedInt16 => 2,
            SampleFormat::Float32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        self.byte_width() as u16 * 8
    }

    /// Short name used in device listings.
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::Unknown => "unknown",
            SampleFormat::UnsignedInt8 => "pcm_8u",
            SampleFormat::SignedInt16 => "pcm_s16",
            SampleFormat::Float32 => "pcm_f32",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields shared by both descriptor shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    /// Builds a consistent PCM-style header for the given layout.
    pub fn new(format_tag: u16, channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let block_align = channels * (bits_per_sample / 8);
        Self {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * block_align as u32,
            block_align,
            bits_per_sample,
        }
    }
}

/// Sub-format identifier carried by extensible descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubFormat {
    Pcm,
    IeeeFloat,
    Other(u128),
}

impl SubFormat {
    pub fn from_guid(guid: u128) -> Self {
        match guid {
            SUBTYPE_PCM => SubFormat::Pcm,
            SUBTYPE_IEEE_FLOAT => SubFormat::IeeeFloat,
            other => SubFormat::Other(other),
        }
    }
}

/// A native mix format as reported by the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveFormatDescriptor {
    Legacy(WaveFormat),
    Extensible {
        format: WaveFormat,
        valid_bits_per_sample: u16,
        channel_mask: u32,
        sub_format: SubFormat,
    },
}

impl WaveFormatDescriptor {
    /// Shared-mode mix formats are almost always 32-bit float extensible.
    pub fn float32(channels: u16, sample_rate: u32) -> Self {
        WaveFormatDescriptor::Extensible {
            format: WaveFormat::new(WAVE_FORMAT_EXTENSIBLE, channels, sample_rate, 32),
            valid_bits_per_sample: 32,
            channel_mask: 0,
            sub_format: SubFormat::IeeeFloat,
        }
    }

    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        WaveFormatDescriptor::Legacy(WaveFormat::new(WAVE_FORMAT_PCM, channels, sample_rate, bits_per_sample))
    }

    pub fn base(&self) -> &WaveFormat {
        match self {
            WaveFormatDescriptor::Legacy(format) => format,
            WaveFormatDescriptor::Extensible { format, .. } => format,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.base().sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.base().channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.base().bits_per_sample
    }

    /// Bytes per interleaved frame as declared by the descriptor.
    pub fn block_align(&self) -> u16 {
        self.base().block_align
    }

    /// Classifies the descriptor into a supported sample format.
    ///
    /// Extensible descriptors are judged by sub-format and bit depth; legacy
    /// descriptors only recognise integer PCM. Any other combination
    /// (24-bit, legacy float tags, unknown sub-formats) is `Unknown`.
    pub fn classify(&self) -> SampleFormat {
        match self {
            WaveFormatDescriptor::Extensible { format, sub_format, .. } => {
                if format.format_tag != WAVE_FORMAT_EXTENSIBLE {
                    return SampleFormat::Unknown;
                }
                match (sub_format, format.bits_per_sample) {
                    (SubFormat::Pcm, 8) => SampleFormat::UnsignedInt8,
                    (SubFormat::Pcm, 16) => SampleFormat::SignedInt16,
                    (SubFormat::IeeeFloat, 32) => SampleFormat::Float32,
                    _ => SampleFormat::Unknown,
                }
            }
            WaveFormatDescriptor::Legacy(format) => {
                if format.format_tag != WAVE_FORMAT_PCM {
                    return SampleFormat::Unknown;
                }
                match format.bits_per_sample {
                    8 => SampleFormat::UnsignedInt8,
                    16 => SampleFormat::SignedInt16,
                    _ => SampleFormat::Unknown,
                }
            }
        }
    }
}
