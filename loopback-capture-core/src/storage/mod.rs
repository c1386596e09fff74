pub mod raw_stream;
pub mod wav_writer;
