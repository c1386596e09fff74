use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::models::error::CaptureError;
use crate::models::format::SampleFormat;
use crate::processing::{convert, wav_format};
use crate::traits::frame_sink::FrameSink;

/// Streaming WAV container writer.
///
/// ## File Format
/// ```text
/// [44-byte WAV header]
/// [interleaved PCM in the writer's output format...]
/// ```
///
/// Both size fields are rewritten after every append, so the file stays
/// readable if the process dies mid-capture. The writer owns its sink; the
/// caller closes it (by dropping the writer) after `finalize`.
pub struct WavWriter<W: Write + Seek> {
    sink: W,
    channels: u16,
    output_format: SampleFormat,
    bytes_written: u64,
}

impl WavWriter<BufWriter<File>> {
    /// Create `path` and write the initial header.
    pub fn create_file(
        path: &Path,
        channels: u16,
        sample_rate: u32,
        output_format: SampleFormat,
    ) -> Result<Self, CaptureError> {
        check_output_format(output_format)?;
        let file = File::create(path)
            .map_err(|e| CaptureError::SinkOpen(format!("failed to create {}: {}", path.display(), e)))?;
        Self::create(BufWriter::new(file), channels, sample_rate, output_format)
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Write a header with placeholder sizes to `sink`.
    ///
    /// Only unsigned 8-bit and signed 16-bit output is representable with
    /// the linear PCM tag.
    pub fn create(mut sink: W, channels: u16, sample_rate: u32, output_format: SampleFormat) -> Result<Self, CaptureError> {
        check_output_format(output_format)?;

        let header = wav_format::generate_wav_header(sample_rate, output_format.bits_per_sample(), channels, 0);
        sink.write_all(&header)
            .map_err(|e| CaptureError::SinkOpen(format!("failed to write header: {}", e)))?;

        Ok(Self {
            sink,
            channels,
            output_format,
            bytes_written: 0,
        })
    }

    /// Convert and append `frame_count` frames; returns false if the write failed.
    pub fn append(&mut self, buffer: &[u8], frame_count: usize, source_format: SampleFormat) -> bool {
        match self.try_append(buffer, frame_count, source_format) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to append audio data: {}", e);
                false
            }
        }
    }

    pub fn try_append(
        &mut self,
        buffer: &[u8],
        frame_count: usize,
        source_format: SampleFormat,
    ) -> Result<(), CaptureError> {
        let pcm = convert::convert(buffer, frame_count, self.channels as usize, source_format, self.output_format)?;

        if let Err(e) = self.sink.write_all(&pcm) {
            // Part of the buffer may have landed; the next append overwrites it.
            if let Err(seek_err) = self.sink.seek(SeekFrom::Start(self.payload_end())) {
                log::warn!("Cannot rewind after failed write: {}", seek_err);
            }
            return Err(CaptureError::Storage(format!("write failed: {}", e)));
        }
        self.bytes_written += pcm.len() as u64;

        self.update_sizes()
    }

    /// Final size rewrite and flush; returns false on failure.
    pub fn finalize(&mut self) -> bool {
        match self.try_finalize() {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to finalize WAV file: {}", e);
                false
            }
        }
    }

    pub fn try_finalize(&mut self) -> Result<(), CaptureError> {
        self.update_sizes()?;
        self.sink.flush().map_err(|e| CaptureError::Storage(e.to_string()))
    }

    /// Payload bytes written so far (excluding the header).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn output_format(&self) -> SampleFormat {
        self.output_format
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Sink offset just past the last fully written payload byte.
    fn payload_end(&self) -> u64 {
        wav_format::WAV_HEADER_SIZE as u64 + self.bytes_written
    }

    fn update_sizes(&mut self) -> Result<(), CaptureError> {
        let riff_size = wav_format::riff_chunk_size(self.bytes_written);
        let data_size = wav_format::data_chunk_size(self.bytes_written);

        // Patch RIFF chunk size at offset 4
        self.sink
            .seek(SeekFrom::Start(wav_format::RIFF_SIZE_OFFSET))
            .map_err(|e| CaptureError::Storage(e.to_string()))?;
        self.sink
            .write_all(&riff_size.to_le_bytes())
            .map_err(|e| CaptureError::Storage(e.to_string()))?;

        // Patch data size at offset 40
        self.sink
            .seek(SeekFrom::Start(wav_format::DATA_SIZE_OFFSET))
            .map_err(|e| CaptureError::Storage(e.to_string()))?;
        self.sink
            .write_all(&data_size.to_le_bytes())
            .map_err(|e| CaptureError::Storage(e.to_string()))?;

        self.sink
            .seek(SeekFrom::Start(self.payload_end()))
            .map_err(|e| CaptureError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl<W: Write + Seek> FrameSink for WavWriter<W> {
    fn write_frames(&mut self, buffer: &[u8], frame_count: usize, source_format: SampleFormat) -> Result<(), CaptureError> {
        self.try_append(buffer, frame_count, source_format)
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        self.try_finalize()
    }
}

fn check_output_format(format: SampleFormat) -> Result<(), CaptureError> {
    match format {
        SampleFormat::UnsignedInt8 | SampleFormat::SignedInt16 => Ok(()),
        other => Err(CaptureError::UnsupportedFormat(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{self, Cursor};
    use std::path::PathBuf;

    use crate::processing::wav_format::read_u32;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("loopback_capture_test_{}_{}", std::process::id(), name))
    }

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Accepts the header, then fails every further write.
    struct FailingSink {
        inner: Cursor<Vec<u8>>,
        allow: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.allow < buf.len() {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.allow -= buf.len();
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    /// Lets `budget` bytes through, fails once, then accepts everything.
    struct TornSink {
        inner: Cursor<Vec<u8>>,
        budget: Option<usize>,
    }

    impl Write for TornSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.budget {
                Some(0) => {
                    self.budget = None;
                    Err(io::Error::new(io::ErrorKind::Other, "device busy"))
                }
                Some(n) => {
                    let len = n.min(buf.len());
                    self.budget = Some(n - len);
                    self.inner.write(&buf[..len])
                }
                None => self.inner.write(buf),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for TornSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn write_plain_wav_file() {
        let path = temp_file_path("plain.wav");

        let mut writer = WavWriter::create_file(&path, 2, 48000, SampleFormat::SignedInt16).unwrap();
        // 4 stereo float frames → 16 bytes of 16-bit PCM
        let input = f32_bytes(&[0.0; 8]);
        assert!(writer.append(&input, 4, SampleFormat::Float32));
        assert!(writer.finalize());
        drop(writer);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 44 + 16);
        assert_eq!(&file_data[0..4], b"RIFF");
        assert_eq!(&file_data[8..12], b"WAVE");
        assert_eq!(read_u32(&file_data, 40), 16);
        assert_eq!(read_u32(&file_data, 4), file_data.len() as u32 - 8);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn sizes_are_current_after_every_append() {
        let mut writer = WavWriter::create(Cursor::new(Vec::new()), 1, 8000, SampleFormat::UnsignedInt8).unwrap();

        assert!(writer.append(&[127, 128, 129], 3, SampleFormat::UnsignedInt8));
        {
            let bytes = writer.sink.get_ref();
            assert_eq!(read_u32(bytes, 40), 3);
            assert_eq!(read_u32(bytes, 4), 36 + 3);
            assert_eq!(bytes.len(), 47);
        }

        assert!(writer.append(&[1, 2], 2, SampleFormat::UnsignedInt8));
        assert_eq!(writer.bytes_written(), 5);

        let bytes = writer.into_inner().into_inner();
        assert_eq!(read_u32(&bytes, 40), 5);
        assert_eq!(read_u32(&bytes, 4), bytes.len() as u32 - 8);
        assert_eq!(&bytes[44..], &[127, 128, 129, 1, 2]);
    }

    #[test]
    fn header_describes_output_format() {
        let writer = WavWriter::create(Cursor::new(Vec::new()), 2, 44100, SampleFormat::UnsignedInt8).unwrap();
        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len(), 44);
        assert_eq!(read_u32(&bytes, 24), 44100);
        assert_eq!(read_u32(&bytes, 28), 44100 * 2);
        assert_eq!(u16::from_le_bytes([bytes[32], bytes[33]]), 2);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 8);
    }

    #[test]
    fn converts_on_append() {
        let mut writer = WavWriter::create(Cursor::new(Vec::new()), 2, 48000, SampleFormat::SignedInt16).unwrap();
        assert!(writer.append(&f32_bytes(&[1.0, -2.0]), 1, SampleFormat::Float32));

        let bytes = writer.into_inner().into_inner();
        assert_eq!(i16::from_le_bytes([bytes[44], bytes[45]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[46], bytes[47]]), -32767);
    }

    #[test]
    fn float_output_is_rejected() {
        let err = WavWriter::create(Cursor::new(Vec::new()), 2, 48000, SampleFormat::Float32)
            .err()
            .unwrap();
        assert_eq!(err, CaptureError::UnsupportedFormat(SampleFormat::Float32));

        let path = temp_file_path("float.wav");
        let err = WavWriter::create_file(&path, 2, 48000, SampleFormat::Float32).err().unwrap();
        assert_eq!(err, CaptureError::UnsupportedFormat(SampleFormat::Float32));
        assert!(!path.exists());
    }

    #[test]
    fn unopenable_path_is_sink_open_error() {
        let path = temp_file_path("missing_dir").join("nested").join("out.wav");
        let err = WavWriter::create_file(&path, 2, 48000, SampleFormat::SignedInt16).err().unwrap();
        assert!(matches!(err, CaptureError::SinkOpen(_)));
    }

    #[test]
    fn failed_write_returns_false() {
        let sink = FailingSink {
            inner: Cursor::new(Vec::new()),
            allow: 44,
        };
        let mut writer = WavWriter::create(sink, 1, 8000, SampleFormat::UnsignedInt8).unwrap();
        assert!(!writer.append(&[1, 2, 3], 3, SampleFormat::UnsignedInt8));
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn torn_write_is_overwritten_by_next_append() {
        let sink = TornSink {
            inner: Cursor::new(Vec::new()),
            budget: Some(44 + 1),
        };
        let mut writer = WavWriter::create(sink, 1, 8000, SampleFormat::UnsignedInt8).unwrap();

        assert!(!writer.append(&[1, 2, 3], 3, SampleFormat::UnsignedInt8));
        assert!(writer.append(&[4, 5], 2, SampleFormat::UnsignedInt8));
        assert!(writer.finalize());

        let bytes = writer.into_inner().inner.into_inner();
        assert_eq!(&bytes[44..], &[4, 5]);
        assert_eq!(read_u32(&bytes, 40), 2);
        assert_eq!(read_u32(&bytes, 4), bytes.len() as u32 - 8);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut writer = WavWriter::create(Cursor::new(Vec::new()), 1, 8000, SampleFormat::SignedInt16).unwrap();
        assert!(writer.append(&[0, 0, 1, 0], 2, SampleFormat::SignedInt16));
        assert!(writer.finalize());
        assert!(writer.finalize());

        let bytes = writer.into_inner().into_inner();
        assert_eq!(bytes.len(), 48);
        assert_eq!(read_u32(&bytes, 40), 4);
        assert_eq!(read_u32(&bytes, 4), 40);
    }
}
