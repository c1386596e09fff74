use std::io::{self, Write};

use crate::models::error::CaptureError;
use crate::models::format::SampleFormat;
use crate::traits::frame_sink::FrameSink;

/// Unframed PCM output, used when no output file is given.
///
/// Buffers are written exactly as captured, in the device's native format,
/// and flushed immediately so a downstream reader sees data as it arrives.
pub struct RawStreamWriter<W: Write> {
    sink: W,
    bytes_written: u64,
}

impl<W: Write> RawStreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, bytes_written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> FrameSink for RawStreamWriter<W> {
    fn write_frames(&mut self, buffer: &[u8], _frame_count: usize, _source_format: SampleFormat) -> Result<(), CaptureError> {
        self.sink
            .write_all(buffer)
            .and_then(|_| self.sink.flush())
            .map_err(stream_error)?;
        self.bytes_written += buffer.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        self.sink.flush().map_err(stream_error)
    }
}

fn stream_error(e: io::Error) -> CaptureError {
    match e.kind() {
        io::ErrorKind::BrokenPipe => CaptureError::SinkClosed(e.to_string()),
        _ => CaptureError::Storage(format!("stream write failed: {}", e)),
    }
}
