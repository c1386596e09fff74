use crate::models::error::CaptureError;
use crate::models::format::SampleFormat;

/// Destination for captured frames.
///
/// Implemented by:
/// - `WavWriter` (RIFF/WAVE container with running size fields)
/// - `RawStreamWriter` (unframed bytes, e.g. stdout)
pub trait FrameSink {
    /// Write `frame_count` interleaved frames captured in `source_format`.
    fn write_frames(&mut self, buffer: &[u8], frame_count: usize, source_format: SampleFormat)
        -> Result<(), CaptureError>;

    /// Flush any pending state. The sink may still be dropped afterwards.
    fn finish(&mut self) -> Result<(), CaptureError>;
}
