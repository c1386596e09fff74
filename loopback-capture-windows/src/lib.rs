//! # loopback-capture-windows
//!
//! Windows WASAPI backend for loopback-capture.
//!
//! Provides:
//! - `WasapiBackend`: render-endpoint enumeration via the MMDevice API
//! - `WasapiAudioClient`: shared-mode loopback stream on a render endpoint
//! - `WasapiCaptureClient`: packet access on a running loopback stream
//!
//! All handles are tied to the COM apartment of the thread that created the
//! backend and must stay on that thread.
//!
//! ## Usage
//! ```ignore
//! use loopback_capture_core::{CaptureSession, NameMatch};
//! use loopback_capture_windows::WasapiBackend;
//!
//! let backend = WasapiBackend::new()?;
//! let mut session = CaptureSession::open(&backend, "Speakers", NameMatch::Partial)?;
//! session.start(16384);
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use device_enumerator::{WasapiBackend, WasapiDevice};
#[cfg(target_os = "windows")]
pub use wasapi_loopback::{WasapiAudioClient, WasapiCaptureClient};
