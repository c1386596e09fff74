pub mod convert;
pub mod wav_format;
