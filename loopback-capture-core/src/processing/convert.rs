//! PCM re-quantization between sample formats.
//!
//! Every supported pair goes through a normalized `f64` in `[-1.0, 1.0]`:
//! - unsigned 8-bit: zero point at 127, `(s - 127) / 127`
//! - signed 16-bit: `s / 32767`
//! - float: taken as already normalized
//!
//! Encoding clamps inclusively and truncates toward zero on the integer
//! cast. Truncation (not rounding) is part of the output contract.

use crate::models::error::CaptureError;
use crate::models::format::SampleFormat;

/// Converts `frame_count` interleaved frames of `channels` samples from
/// `from` to `to`.
///
/// Identical formats are copied byte for byte. An `Unknown` source is
/// assumed to already be in the destination format and is copied as well.
/// Conversion into `Float32` (or `Unknown`) is not implemented.
pub fn convert(
    input: &[u8],
    frame_count: usize,
    channels: usize,
    from: SampleFormat,
    to: SampleFormat,
) -> Result<Vec<u8>, CaptureError> {
    let samples = frame_count * channels;

    if from == to || from == SampleFormat::Unknown {
        let len = samples * to.byte_width();
        check_len(input, len)?;
        return Ok(input[..len].to_vec());
    }

    if !matches!(to, SampleFormat::UnsignedInt8 | SampleFormat::SignedInt16) {
        return Err(CaptureError::UnsupportedConversion { from, to });
    }

    check_len(input, samples * from.byte_width())?;

    let mut output = Vec::with_capacity(samples * to.byte_width());
    for raw in input.chunks_exact(from.byte_width()).take(samples) {
        let unit = decode_unit(from, raw);
        match to {
            SampleFormat::UnsignedInt8 => output.push(unit_to_u8(unit)),
            _ => output.extend_from_slice(&unit_to_i16(unit).to_le_bytes()),
        }
    }
    Ok(output)
}

/// Normalizes one little-endian sample of `format` to `[-1.0, 1.0]`.
///
/// Integer inputs at the extremes can land slightly outside the range
/// (255 → 1.0079, -32768 → -1.00003); encoders clamp.
pub fn decode_unit(format: SampleFormat, raw: &[u8]) -> f64 {
    match format {
        SampleFormat::UnsignedInt8 => (raw[0] as f64 - 127.0) / 127.0,
        SampleFormat::SignedInt16 => i16::from_le_bytes([raw[0], raw[1]]) as f64 / 32767.0,
        SampleFormat::Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
        SampleFormat::Unknown => 0.0,
    }
}

/// Clamps to `[-1.0, 1.0]`; NaN is treated as silence.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

pub fn unit_to_u8(value: f64) -> u8 {
    (clamp_unit(value) * 127.0 + 127.0) as u8
}

pub fn unit_to_i16(value: f64) -> i16 {
    (clamp_unit(value) * 32767.0) as i16
}

fn check_len(input: &[u8], expected: usize) -> Result<(), CaptureError> {
    if input.len() < expected {
        return Err(CaptureError::ShortBuffer {
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn as_i16(bytes: &[u8]) -> Vec<i16> {
        bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect()
    }

    #[test]
    fn output_length_matches_destination_width() {
        let frames = 5;
        let channels = 2;
        let pairs = [
            (SampleFormat::UnsignedInt8, SampleFormat::UnsignedInt8),
            (SampleFormat::UnsignedInt8, SampleFormat::SignedInt16),
            (SampleFormat::SignedInt16, SampleFormat::UnsignedInt8),
            (SampleFormat::SignedInt16, SampleFormat::SignedInt16),
            (SampleFormat::Float32, SampleFormat::UnsignedInt8),
            (SampleFormat::Float32, SampleFormat::SignedInt16),
            (SampleFormat::Float32, SampleFormat::Float32),
            (SampleFormat::Unknown, SampleFormat::SignedInt16),
        ];
        for (from, to) in pairs {
            let input = vec![0u8; frames * channels * from.byte_width().max(to.byte_width())];
            let out = convert(&input, frames, channels, from, to).unwrap();
            assert_eq!(out.len(), frames * channels * to.byte_width(), "{from} -> {to}");
        }
    }

    #[test]
    fn identity_is_byte_copy() {
        let input = i16_bytes(&[-32768, -1, 0, 1, 32767, 1234]);
        let out = convert(&input, 3, 2, SampleFormat::SignedInt16, SampleFormat::SignedInt16).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn u8_to_i16_values() {
        let out = convert(&[0, 127, 255, 200], 4, 1, SampleFormat::UnsignedInt8, SampleFormat::SignedInt16).unwrap();
        // 200: 73/127 * 32767 = 18834.57 → truncated
        assert_eq!(as_i16(&out), vec![-32767, 0, 32767, 18834]);
    }

    #[test]
    fn i16_to_u8_values() {
        let input = i16_bytes(&[-32768, -32767, -1, 0, 16384, 32767]);
        let out = convert(&input, 6, 1, SampleFormat::SignedInt16, SampleFormat::UnsignedInt8).unwrap();
        // -1: 126.996 truncates to 126; 16384: 190.5 truncates to 190
        assert_eq!(out, vec![0, 0, 126, 127, 190, 254]);
    }

    #[test]
    fn f32_to_u8_and_i16_values() {
        let input = f32_bytes(&[-1.0, -0.5, 0.0, 0.5, 1.0]);
        let u8s = convert(&input, 5, 1, SampleFormat::Float32, SampleFormat::UnsignedInt8).unwrap();
        assert_eq!(u8s, vec![0, 63, 127, 190, 254]);

        let i16s = convert(&input, 5, 1, SampleFormat::Float32, SampleFormat::SignedInt16).unwrap();
        assert_eq!(as_i16(&i16s), vec![-32767, -16383, 0, 16383, 32767]);
    }

    #[test]
    fn out_of_range_floats_clamp() {
        let input = f32_bytes(&[2.0, -2.0, f32::INFINITY, f32::NEG_INFINITY]);
        let i16s = convert(&input, 4, 1, SampleFormat::Float32, SampleFormat::SignedInt16).unwrap();
        assert_eq!(as_i16(&i16s), vec![32767, -32767, 32767, -32767]);

        let u8s = convert(&input, 4, 1, SampleFormat::Float32, SampleFormat::UnsignedInt8).unwrap();
        assert_eq!(u8s, vec![254, 0, 254, 0]);
    }

    #[test]
    fn nan_becomes_silence() {
        let input = f32_bytes(&[f32::NAN]);
        let u8s = convert(&input, 1, 1, SampleFormat::Float32, SampleFormat::UnsignedInt8).unwrap();
        assert_eq!(u8s, vec![127]);
    }

    #[test]
    fn u8_round_trip_through_i16() {
        for (input, tolerance) in [(127u8, 0i32), (0, 1), (255, 1)] {
            let wide = convert(&[input], 1, 1, SampleFormat::UnsignedInt8, SampleFormat::SignedInt16).unwrap();
            let back = convert(&wide, 1, 1, SampleFormat::SignedInt16, SampleFormat::UnsignedInt8).unwrap();
            assert!((back[0] as i32 - input as i32).abs() <= tolerance, "{input} came back as {}", back[0]);
        }
    }

    #[test]
    fn channel_order_is_preserved() {
        let input = f32_bytes(&[1.0, -1.0, 0.0, 0.5]);
        let out = convert(&input, 2, 2, SampleFormat::Float32, SampleFormat::SignedInt16).unwrap();
        assert_eq!(as_i16(&out), vec![32767, -32767, 0, 16383]);
    }

    #[test]
    fn conversion_into_float_is_rejected() {
        let err = convert(&[0, 0], 1, 1, SampleFormat::SignedInt16, SampleFormat::Float32).unwrap_err();
        assert_eq!(
            err,
            CaptureError::UnsupportedConversion {
                from: SampleFormat::SignedInt16,
                to: SampleFormat::Float32,
            }
        );
    }

    #[test]
    fn unknown_source_passes_through_unchanged() {
        // Known sharp edge: the bytes are not inspected at all, so float data
        // labelled Unknown is written out as if it were 16-bit PCM.
        let input = f32_bytes(&[0.5]);
        let out = convert(&input, 2, 1, SampleFormat::Unknown, SampleFormat::SignedInt16).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn short_input_is_an_error() {
        let err = convert(&[0u8; 3], 1, 1, SampleFormat::Float32, SampleFormat::SignedInt16).unwrap_err();
        assert_eq!(err, CaptureError::ShortBuffer { expected: 4, actual: 3 });
    }

    #[test]
    fn decode_normalizes() {
        assert_relative_eq!(decode_unit(SampleFormat::UnsignedInt8, &[254]), 1.0);
        assert_relative_eq!(decode_unit(SampleFormat::UnsignedInt8, &[127]), 0.0);
        assert_relative_eq!(decode_unit(SampleFormat::SignedInt16, &(-32767i16).to_le_bytes()), -1.0);
        assert_relative_eq!(decode_unit(SampleFormat::Float32, &0.25f32.to_le_bytes()), 0.25);
    }
}
