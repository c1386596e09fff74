//! WAV file format utilities.
//!
//! Generates the fixed 44-byte RIFF/WAVE header used for captured PCM and
//! the size values that get rewritten as payload is appended.

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of the PCM `fmt ` sub-chunk body.
pub const FMT_CHUNK_SIZE: u32 = 16;

/// Offset of the RIFF chunk size (file size - 8).
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the `data` sub-chunk size.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let bytes_per_sample = u32::from(bit_depth / 8);
    let byte_rate = sample_rate
        .wrapping_mul(u32::from(channels))
        .wrapping_mul(bytes_per_sample);
    let block_align = channels.wrapping_mul(bit_depth / 8);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_chunk_size(u64::from(data_size)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM format code
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// RIFF chunk size for a payload of `data_size` bytes, saturating at `u32::MAX`.
pub fn riff_chunk_size(data_size: u64) -> u32 {
    let total = data_size + (WAV_HEADER_SIZE as u64 - 8);
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Data sub-chunk size, saturating at `u32::MAX`.
pub fn data_chunk_size(data_size: u64) -> u32 {
    u32::try_from(data_size).unwrap_or(u32::MAX)
}

/// Little-endian `u32` at `offset`.
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}
