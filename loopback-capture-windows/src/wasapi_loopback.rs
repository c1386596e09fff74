//! WASAPI loopback stream on a render endpoint.
//!
//! The audio client is initialized in shared mode with
//! `AUDCLNT_STREAMFLAGS_LOOPBACK`, so the capture client hands back the mix
//! that is being played to the device. DRM-protected audio arrives as
//! silence.

use std::rc::Rc;

use windows::Win32::Media::Audio::*;

use loopback_capture_core::models::error::CaptureError;
use loopback_capture_core::models::format::{self, SubFormat, WaveFormat, WaveFormatDescriptor};
use loopback_capture_core::traits::audio_backend::{AudioClient, CaptureClient, CapturedPacket};

use crate::com::{ComApartment, CoTaskMem};

/// Bytes of `WAVEFORMATEXTENSIBLE` that follow the `WAVEFORMATEX` header.
const EXTENSIBLE_EXTRA_BYTES: u16 = 22;

/// `IAudioClient` for one render endpoint, plus its mix format.
pub struct WasapiAudioClient {
    client: IAudioClient,
    mix_format: CoTaskMem<WAVEFORMATEX>,
    descriptor: WaveFormatDescriptor,
    _apartment: Rc<ComApartment>,
}

impl WasapiAudioClient {
    pub(crate) fn new(client: IAudioClient, apartment: Rc<ComApartment>) -> Result<Self, CaptureError> {
        unsafe {
            let raw = client
                .GetMixFormat()
                .map_err(|e| CaptureError::AudioClient(format!("GetMixFormat failed: {}", e)))?;
            let mix_format = CoTaskMem::from_raw(raw);
            if mix_format.is_null() {
                return Err(CaptureError::AudioClient("GetMixFormat returned no format".into()));
            }
            let descriptor = descriptor_from_raw(mix_format.as_ptr());
            log::debug!(
                "Mix format: {} Hz, {} ch, {} bits, {}",
                descriptor.sample_rate(),
                descriptor.channels(),
                descriptor.bits_per_sample(),
                descriptor.classify()
            );
            Ok(Self {
                client,
                mix_format,
                descriptor,
                _apartment: apartment,
            })
        }
    }
}

impl AudioClient for WasapiAudioClient {
    type Capture = WasapiCaptureClient;

    fn mix_format(&self) -> Result<WaveFormatDescriptor, CaptureError> {
        Ok(self.descriptor)
    }

    fn initialize_loopback(&mut self, buffer_duration_hns: i64) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    AUDCLNT_STREAMFLAGS_LOOPBACK,
                    buffer_duration_hns,
                    0,
                    self.mix_format.as_ptr(),
                    None,
                )
                .map_err(|e| CaptureError::AudioClient(format!("IAudioClient::Initialize (loopback) failed: {}", e)))
        }
    }

    fn buffer_size(&self) -> Result<u32, CaptureError> {
        unsafe {
            self.client
                .GetBufferSize()
                .map_err(|e| CaptureError::AudioClient(format!("GetBufferSize failed: {}", e)))
        }
    }

    fn capture_client(&self) -> Result<WasapiCaptureClient, CaptureError> {
        unsafe {
            let capture: IAudioCaptureClient = self
                .client
                .GetService()
                .map_err(|e| CaptureError::AudioClient(format!("GetService failed: {}", e)))?;
            Ok(WasapiCaptureClient {
                capture,
                block_align: usize::from(self.descriptor.block_align()),
                _apartment: Rc::clone(&self._apartment),
            })
        }
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Start()
                .map_err(|e| CaptureError::AudioClient(format!("IAudioClient::Start failed: {}", e)))
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Stop()
                .map_err(|e| CaptureError::Capture(format!("IAudioClient::Stop failed: {}", e)))
        }
    }
}

/// `IAudioCaptureClient` of an initialized loopback stream.
pub struct WasapiCaptureClient {
    capture: IAudioCaptureClient,
    block_align: usize,
    _apartment: Rc<ComApartment>,
}

impl CaptureClient for WasapiCaptureClient {
    fn next_packet_size(&mut self) -> Result<u32, CaptureError> {
        unsafe {
            self.capture
                .GetNextPacketSize()
                .map_err(|e| CaptureError::Capture(format!("GetNextPacketSize failed: {}", e)))
        }
    }

    fn get_buffer(&mut self) -> Result<CapturedPacket<'_>, CaptureError> {
        let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
        let mut frames: u32 = 0;
        let mut flags: u32 = 0;

        unsafe {
            self.capture
                .GetBuffer(&mut buffer_ptr, &mut frames, &mut flags, None, None)
                .map_err(|e| CaptureError::Capture(format!("GetBuffer failed: {}", e)))?;

            let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
            // The slice stays valid until ReleaseBuffer, which needs `&mut self`.
            let data: &[u8] = if buffer_ptr.is_null() || silent {
                &[]
            } else {
                std::slice::from_raw_parts(buffer_ptr, frames as usize * self.block_align)
            };

            Ok(CapturedPacket { data, frames, silent })
        }
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), CaptureError> {
        unsafe {
            self.capture
                .ReleaseBuffer(frames)
                .map_err(|e| CaptureError::Capture(format!("ReleaseBuffer failed: {}", e)))
        }
    }
}

/// Read a `WAVEFORMATEX` (or extensible) block into a descriptor.
///
/// # Safety
/// `ptr` must point at a valid `WAVEFORMATEX`, followed by the extensible
/// tail whenever `cbSize` says so.
unsafe fn descriptor_from_raw(ptr: *const WAVEFORMATEX) -> WaveFormatDescriptor {
    let header = *ptr;
    let format = WaveFormat {
        format_tag: header.wFormatTag,
        channels: header.nChannels,
        sample_rate: header.nSamplesPerSec,
        avg_bytes_per_sec: header.nAvgBytesPerSec,
        block_align: header.nBlockAlign,
        bits_per_sample: header.wBitsPerSample,
    };

    // The extension decides the shape; a tag mismatch is left to `classify`.
    if header.cbSize < EXTENSIBLE_EXTRA_BYTES {
        return WaveFormatDescriptor::Legacy(format);
    }

    let extensible = *(ptr as *const WAVEFORMATEXTENSIBLE);
    let samples = extensible.Samples;
    let guid = extensible.SubFormat;
    WaveFormatDescriptor::Extensible {
        format,
        valid_bits_per_sample: samples.wValidBitsPerSample,
        channel_mask: extensible.dwChannelMask,
        sub_format: SubFormat::from_guid(guid.to_u128()),
    }
}
