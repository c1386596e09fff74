//! # loopback-capture-core
//!
//! Platform-agnostic loopback capture core library.
//!
//! Records what a render device is playing: resolves the device, negotiates
//! a shared-mode loopback stream, drains the OS ring buffer on demand,
//! re-quantizes PCM and writes it to a WAV container or a raw stream.
//! Platform backends (Windows WASAPI) implement the `AudioBackend` traits and
//! plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! loopback-capture-core (this crate)
//! ├── traits/       ← AudioBackend, AudioDevice, AudioClient, CaptureClient, FrameSink
//! ├── models/       ← CaptureError, SampleFormat, WaveFormatDescriptor, DeviceInfo, SessionState
//! ├── processing/   ← sample conversion, WAV header generation
//! ├── session/      ← DeviceDirectory, CaptureSession, capture loop
//! ├── storage/      ← WavWriter, RawStreamWriter
//! └── mock          ← scripted backend for tests
//! ```

pub mod mock;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{DeviceInfo, NameMatch};
pub use models::config::{CaptureConfiguration, DEFAULT_RING_CAPACITY_FRAMES};
pub use models::error::CaptureError;
pub use models::format::{SampleFormat, SubFormat, WaveFormat, WaveFormatDescriptor};
pub use models::state::SessionState;
pub use processing::convert::convert;
pub use session::capture::CaptureSession;
pub use session::device_directory::DeviceDirectory;
pub use session::recorder::{run_capture, CaptureStats};
pub use storage::raw_stream::RawStreamWriter;
pub use storage::wav_writer::WavWriter;
pub use traits::audio_backend::{AudioBackend, AudioClient, AudioDevice, CaptureClient, CapturedPacket};
pub use traits::frame_sink::FrameSink;
